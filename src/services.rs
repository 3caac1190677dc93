//! Static pricing catalog for C.F.T. Hub & Co.
//!
//! All prices are in naira. Three pricing shapes exist: fixed (barbing cuts,
//! charging device types), per-unit (printing, copying, scanning,
//! lamination), and base-plus-per-page (binding). Unknown identifiers are
//! unrepresentable: every service is an enum variant, so lookups cannot fail
//! at runtime.

use serde::{Deserialize, Serialize};

/// Loyalty reward rate applied to every non-cashback payment.
pub const CASHBACK_RATE: f64 = 0.05;

/// Per-page surcharge added on top of a binding base price.
pub const BINDING_PER_PAGE: f64 = 2.0;

/// Cashback earned on `amount`: 5% rounded to the nearest whole naira,
/// ties away from zero.
pub fn calculate_cashback(amount: f64) -> f64 {
    (amount * CASHBACK_RATE).round()
}

// ---------------------------------------------------------------------------
// Payment modes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMode {
    Cash,
    Transfer,
    /// Card terminal.
    Pos,
    /// Pay the whole total from the customer's cashback balance.
    Cashback,
}

impl PaymentMode {
    pub const ALL: [PaymentMode; 4] = [
        PaymentMode::Cash,
        PaymentMode::Transfer,
        PaymentMode::Pos,
        PaymentMode::Cashback,
    ];

    pub fn label(self) -> &'static str {
        match self {
            PaymentMode::Cash => "Cash",
            PaymentMode::Transfer => "Transfer",
            PaymentMode::Pos => "POS",
            PaymentMode::Cashback => "Cashback",
        }
    }

    pub fn from_value(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cash" => Some(PaymentMode::Cash),
            "transfer" => Some(PaymentMode::Transfer),
            "pos" => Some(PaymentMode::Pos),
            "cashback" => Some(PaymentMode::Cashback),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Service categories
// ---------------------------------------------------------------------------

/// The three service flows. Serialized with the display labels the
/// `transactions.service_category` column has always stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceCategory {
    #[serde(rename = "Barbing Services")]
    Barbing,
    #[serde(rename = "Charging Hub")]
    Charging,
    #[serde(rename = "Computer Services")]
    Computer,
}

impl ServiceCategory {
    pub fn label(self) -> &'static str {
        match self {
            ServiceCategory::Barbing => "Barbing Services",
            ServiceCategory::Charging => "Charging Hub",
            ServiceCategory::Computer => "Computer Services",
        }
    }

    pub fn from_value(value: &str) -> Option<Self> {
        match value.trim() {
            "Barbing Services" => Some(ServiceCategory::Barbing),
            "Charging Hub" => Some(ServiceCategory::Charging),
            "Computer Services" => Some(ServiceCategory::Computer),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Barbing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarbingCut {
    AdultMaleCut,
    AdultFemaleCut,
    ChildrenCut,
    ToddlerCut,
}

impl BarbingCut {
    pub const ALL: [BarbingCut; 4] = [
        BarbingCut::AdultMaleCut,
        BarbingCut::AdultFemaleCut,
        BarbingCut::ChildrenCut,
        BarbingCut::ToddlerCut,
    ];

    pub fn label(self) -> &'static str {
        match self {
            BarbingCut::AdultMaleCut => "Adult Male Cut",
            BarbingCut::AdultFemaleCut => "Adult Female Cut",
            BarbingCut::ChildrenCut => "Children's Cut",
            BarbingCut::ToddlerCut => "Toddler's Cut",
        }
    }

    pub fn price(self) -> f64 {
        match self {
            BarbingCut::AdultMaleCut | BarbingCut::AdultFemaleCut => 1000.0,
            BarbingCut::ChildrenCut | BarbingCut::ToddlerCut => 500.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Charging
// ---------------------------------------------------------------------------

/// Device types accepted at the charging hub, each at a flat price per
/// charge regardless of duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Iphone,
    Android,
    PowerBank,
    Laptop,
    Other,
}

impl DeviceType {
    pub const ALL: [DeviceType; 5] = [
        DeviceType::Iphone,
        DeviceType::Android,
        DeviceType::PowerBank,
        DeviceType::Laptop,
        DeviceType::Other,
    ];

    pub fn label(self) -> &'static str {
        match self {
            DeviceType::Iphone => "iPhone",
            DeviceType::Android => "Android",
            DeviceType::PowerBank => "Power Bank",
            DeviceType::Laptop => "Laptop",
            DeviceType::Other => "Other",
        }
    }

    pub fn price(self) -> f64 {
        match self {
            DeviceType::Iphone => 200.0,
            DeviceType::Android => 150.0,
            DeviceType::PowerBank => 300.0,
            DeviceType::Laptop => 500.0,
            DeviceType::Other => 200.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Computer services
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrintService {
    Bw,
    Color,
}

impl PrintService {
    pub fn label(self) -> &'static str {
        match self {
            PrintService::Bw => "B&W Printing",
            PrintService::Color => "Color Printing",
        }
    }

    pub fn price_per_page(self) -> f64 {
        match self {
            PrintService::Bw => 50.0,
            PrintService::Color => 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyService {
    BwSingle,
    BwDouble,
    ColorSingle,
    ColorDouble,
}

impl CopyService {
    pub fn label(self) -> &'static str {
        match self {
            CopyService::BwSingle => "B&W Single-sided",
            CopyService::BwDouble => "B&W Double-sided",
            CopyService::ColorSingle => "Color Single-sided",
            CopyService::ColorDouble => "Color Double-sided",
        }
    }

    pub fn price_per_page(self) -> f64 {
        match self {
            CopyService::BwSingle => 20.0,
            CopyService::BwDouble => 30.0,
            CopyService::ColorSingle => 50.0,
            CopyService::ColorDouble => 70.0,
        }
    }
}

/// Scanning has a single standard rate.
pub const SCAN_PRICE_PER_PAGE: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingService {
    Comb,
    Wire,
}

impl BindingService {
    pub fn label(self) -> &'static str {
        match self {
            BindingService::Comb => "Comb Binding",
            BindingService::Wire => "Wire Binding",
        }
    }

    pub fn base_price(self) -> f64 {
        match self {
            BindingService::Comb => 100.0,
            BindingService::Wire => 150.0,
        }
    }

    /// Base fee plus the flat per-page surcharge.
    pub fn price_for_pages(self, pages: u32) -> f64 {
        self.base_price() + BINDING_PER_PAGE * f64::from(pages)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaminationService {
    A4,
    A3,
}

impl LaminationService {
    pub fn label(self) -> &'static str {
        match self {
            LaminationService::A4 => "A4 Lamination",
            LaminationService::A3 => "A3 Lamination",
        }
    }

    pub fn price_per_item(self) -> f64 {
        match self {
            LaminationService::A4 => 200.0,
            LaminationService::A3 => 300.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Currency formatting
// ---------------------------------------------------------------------------

/// Format a naira amount with thousands separators: `₦1,000`, `₦50.50`.
/// Kobo digits are shown only when the amount is fractional.
pub fn format_naira(amount: f64) -> String {
    let negative = amount < 0.0;
    let total_kobo = (amount.abs() * 100.0).round() as i64;
    let whole = total_kobo / 100;
    let kobo = total_kobo % 100;

    let body = if kobo == 0 {
        group_thousands(whole)
    } else {
        format!("{}.{:02}", group_thousands(whole), kobo)
    };

    if negative {
        format!("-₦{body}")
    } else {
        format!("₦{body}")
    }
}

fn group_thousands(n: i64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

// ===========================================================================
// Tests
// ===========================================================================
