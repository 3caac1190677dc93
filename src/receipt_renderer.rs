//! Plain-text receipt rendering for 82mm thermal paper.
//!
//! One renderer serves both the on-screen preview and the print spooler, so
//! the two can never drift apart. 82mm paper gives 48 printable columns in
//! the standard font.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cart::ServiceDetails;
use crate::services::{format_naira, PaymentMode, ServiceCategory};
use crate::store::TransactionRecord;

/// Printable columns on 82mm paper.
pub const RECEIPT_WIDTH: usize = 48;

const BUSINESS_NAME: &str = "C.F.T. Hub & Co.";
const BUSINESS_TAGLINE: &str = "Point of Sale System";

// ---------------------------------------------------------------------------
// View model
// ---------------------------------------------------------------------------

/// Everything a printed receipt carries. Built by settlement, or rebuilt
/// from a stored transaction record for reprints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptData {
    pub receipt_number: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub service_category: ServiceCategory,
    pub service_details: ServiceDetails,
    /// The amount actually collected.
    pub total_amount: f64,
    pub payment_mode: PaymentMode,
    pub cashback_used: f64,
    pub cashback_earned: f64,
    pub transaction_date: DateTime<Utc>,
    pub additional_notes: Option<String>,
}

impl ReceiptData {
    /// Rebuild the receipt view from a stored transaction, e.g. for a
    /// reprint. Renders identically to the receipt produced at settlement.
    pub fn from_record(record: &TransactionRecord) -> Self {
        Self {
            receipt_number: record.receipt_number.clone(),
            customer_name: record.customer_name.clone(),
            customer_phone: record.customer_phone.clone(),
            service_category: record.service_category,
            service_details: record.service_details.clone(),
            total_amount: record.total_amount,
            payment_mode: record.payment_mode,
            cashback_used: record.cashback_used,
            cashback_earned: record.cashback_earned,
            transaction_date: record.transaction_date,
            additional_notes: record.additional_notes.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Layout helpers
// ---------------------------------------------------------------------------

fn center(text: &str) -> String {
    let len = text.chars().count();
    if len >= RECEIPT_WIDTH {
        return text.to_string();
    }
    let pad = (RECEIPT_WIDTH - len) / 2;
    format!("{}{}", " ".repeat(pad), text)
}

/// Left label, right value, padded to the paper width. Overlong pairs keep
/// a single separating space rather than truncating the value.
fn row(left: &str, right: &str) -> String {
    let used = left.chars().count() + right.chars().count();
    let pad = if used + 1 > RECEIPT_WIDTH {
        1
    } else {
        RECEIPT_WIDTH - used
    };
    format!("{left}{}{right}", " ".repeat(pad))
}

fn divider() -> String {
    "-".repeat(RECEIPT_WIDTH)
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Render the full receipt as plain text, one line per `\n`.
pub fn render(data: &ReceiptData) -> String {
    let mut lines: Vec<String> = Vec::with_capacity(24);

    // Header
    lines.push(center(BUSINESS_NAME));
    lines.push(center(BUSINESS_TAGLINE));
    lines.push(divider());

    // Identity block
    lines.push(row("Receipt #:", &data.receipt_number));
    lines.push(row(
        "Date:",
        &data.transaction_date.format("%d/%m/%Y %H:%M").to_string(),
    ));
    lines.push(row("Customer:", &data.customer_name));
    lines.push(row("Phone:", &data.customer_phone));
    lines.push(divider());

    // Service breakdown
    lines.push(data.service_category.label().to_string());
    match &data.service_details {
        ServiceDetails::Barbing { service_type, .. } => {
            lines.push(row("Service:", service_type));
        }
        ServiceDetails::Charging {
            devices,
            port_number,
            ..
        } => {
            for device in devices {
                lines.push(row(&device.device_type, &format_naira(device.price)));
            }
            lines.push(row("Port:", port_number));
        }
        ServiceDetails::Computer { services, .. } => {
            for service in services {
                lines.push(row(&format!("{}:", service.name), &format_naira(service.price)));
            }
        }
    }

    if let Some(notes) = data.additional_notes.as_deref().filter(|n| !n.is_empty()) {
        lines.push("Notes:".to_string());
        lines.push(format!("  {notes}"));
    }
    lines.push(divider());

    // Payment block
    lines.push(row(
        "Subtotal:",
        &format_naira(data.total_amount + data.cashback_used),
    ));
    if data.cashback_used > 0.0 {
        lines.push(row(
            "Cashback Used:",
            &format!("-{}", format_naira(data.cashback_used)),
        ));
    }
    lines.push(row("Total Paid:", &format_naira(data.total_amount)));
    lines.push(row("Payment Mode:", data.payment_mode.label()));
    if data.cashback_earned > 0.0 {
        lines.push(row(
            "Cashback Earned:",
            &format!("+{}", format_naira(data.cashback_earned)),
        ));
    }
    lines.push(divider());

    // Footer
    lines.push(center("Thank You!"));
    lines.push(center("Visit us again soon"));

    lines.join("\n")
}

// ===========================================================================
// Tests
// ===========================================================================
