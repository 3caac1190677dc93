//! Reporting summaries over settled transactions.
//!
//! Pure aggregation over a fetched list: the store applies the filter,
//! this module adds the numbers up the way the reports screen shows them.

use serde::Serialize;

use crate::error::PosError;
use crate::store::{TransactionFilter, TransactionRecord, TransactionStore};

/// Headline numbers for a filtered set of transactions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ReportSummary {
    pub transactions: usize,
    /// Sum of amounts actually collected (redemptions contribute 0).
    pub revenue: f64,
    pub cashback_used: f64,
    pub cashback_earned: f64,
}

/// Aggregate a transaction list into its summary.
pub fn summarize(records: &[TransactionRecord]) -> ReportSummary {
    let mut summary = ReportSummary {
        transactions: records.len(),
        ..Default::default()
    };
    for record in records {
        summary.revenue += record.total_amount;
        summary.cashback_used += record.cashback_used;
        summary.cashback_earned += record.cashback_earned;
    }
    summary
}

/// Fetch the transactions matching `filter` together with their summary.
pub async fn fetch_report<S: TransactionStore>(
    store: &S,
    filter: &TransactionFilter,
) -> Result<(Vec<TransactionRecord>, ReportSummary), PosError> {
    let records = store.list_transactions(filter).await?;
    let summary = summarize(&records);
    Ok((records, summary))
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::ServiceDetails;
    use crate::memory::MemoryStore;
    use crate::services::{PaymentMode, ServiceCategory};
    use chrono::Utc;

    fn record(amount: f64, used: f64, earned: f64, category: ServiceCategory) -> TransactionRecord {
        TransactionRecord {
            id: None,
            receipt_number: "CFT20260310001".to_string(),
            customer_name: "Ada".to_string(),
            customer_phone: "08012345678".to_string(),
            service_category: category,
            service_details: ServiceDetails::Barbing {
                service_type: "Adult Male Cut".to_string(),
                price: amount,
            },
            total_amount: amount,
            payment_mode: PaymentMode::Cash,
            cashback_used: used,
            cashback_earned: earned,
            additional_notes: None,
            transaction_date: Utc::now(),
        }
    }

    #[test]
    fn test_summarize_empty() {
        let summary = summarize(&[]);
        assert_eq!(summary.transactions, 0);
        assert_eq!(summary.revenue, 0.0);
    }

    #[test]
    fn test_summarize_mixed_sales_and_redemptions() {
        let records = vec![
            record(1000.0, 0.0, 50.0, ServiceCategory::Barbing),
            record(0.0, 150.0, 0.0, ServiceCategory::Charging),
            record(900.0, 0.0, 45.0, ServiceCategory::Computer),
        ];
        let summary = summarize(&records);
        assert_eq!(summary.transactions, 3);
        assert_eq!(summary.revenue, 1900.0);
        assert_eq!(summary.cashback_used, 150.0);
        assert_eq!(summary.cashback_earned, 95.0);
    }

    #[tokio::test]
    async fn test_fetch_report_applies_filter() {
        let store = MemoryStore::new();
        store
            .insert_transaction(&record(1000.0, 0.0, 50.0, ServiceCategory::Barbing))
            .await
            .unwrap();
        store
            .insert_transaction(&record(700.0, 0.0, 35.0, ServiceCategory::Charging))
            .await
            .unwrap();

        let filter = TransactionFilter {
            category: Some(ServiceCategory::Charging),
            ..Default::default()
        };
        let (records, summary) = fetch_report(&store, &filter).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(summary.revenue, 700.0);
    }
}
