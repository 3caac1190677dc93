//! Cart assembly for the three service flows.
//!
//! Each flow implements [`ServiceOrder`]: it validates its own inputs,
//! produces the priced line items, and emits the typed `service_details`
//! payload stored with the transaction. Line items exist only while a cart
//! is being assembled; the details payload is what survives settlement.
//!
//! Inclusion rule shared by every flow: an item appears in the cart only
//! when it is explicitly enabled AND its quantity is greater than zero.

use serde::{Deserialize, Serialize};

use crate::error::PosError;
use crate::services::{
    BarbingCut, BindingService, CopyService, DeviceType, LaminationService, PrintService,
    ServiceCategory, SCAN_PRICE_PER_PAGE,
};

// ---------------------------------------------------------------------------
// Line items
// ---------------------------------------------------------------------------

/// One priced unit of work in a cart. In-memory only; discarded after
/// settlement.
#[derive(Debug, Clone, PartialEq)]
pub struct LineItem {
    pub label: String,
    pub quantity: u32,
    pub price: f64,
    /// Category tag: "barbing", "charging", "printing", "copying",
    /// "scanning", "binding", or "lamination".
    pub tag: &'static str,
}

// ---------------------------------------------------------------------------
// Service-details payloads
// ---------------------------------------------------------------------------

/// One charged device on a charging-hub ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceLine {
    pub device_type: String,
    pub price: f64,
}

/// One line of a computer-services breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputerLine {
    pub name: String,
    pub price: f64,
    pub quantity: u32,
    #[serde(rename = "type")]
    pub tag: String,
}

/// Category-specific pricing breakdown stored in the `service_details`
/// JSON column. Untagged: the field sets are disjoint, and the category
/// column discriminates on the way back out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServiceDetails {
    #[serde(rename_all = "camelCase")]
    Charging {
        devices: Vec<DeviceLine>,
        port_number: String,
        price: f64,
    },
    #[serde(rename_all = "camelCase")]
    Computer {
        services: Vec<ComputerLine>,
        total_services: usize,
    },
    #[serde(rename_all = "camelCase")]
    Barbing { service_type: String, price: f64 },
}

// ---------------------------------------------------------------------------
// The order contract
// ---------------------------------------------------------------------------

/// Capability set shared by the three service flows. Settlement is generic
/// over this, so the orchestration is written once.
pub trait ServiceOrder {
    fn category(&self) -> ServiceCategory;

    /// Flow-specific input checks beyond "the cart is non-empty".
    fn validate(&self) -> Result<(), PosError> {
        Ok(())
    }

    /// The priced cart, in catalog order. Deterministic for equal inputs.
    fn line_items(&self) -> Vec<LineItem>;

    /// The payload persisted with the transaction record.
    fn details(&self) -> ServiceDetails;

    /// Sum of all included line-item prices. Zero means nothing selected.
    fn total(&self) -> f64 {
        self.line_items().iter().map(|item| item.price).sum()
    }
}

// ---------------------------------------------------------------------------
// Barbing
// ---------------------------------------------------------------------------

/// A barbing ticket: exactly one cut at its fixed price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarbingOrder {
    pub cut: BarbingCut,
}

impl ServiceOrder for BarbingOrder {
    fn category(&self) -> ServiceCategory {
        ServiceCategory::Barbing
    }

    fn line_items(&self) -> Vec<LineItem> {
        vec![LineItem {
            label: self.cut.label().to_string(),
            quantity: 1,
            price: self.cut.price(),
            tag: "barbing",
        }]
    }

    fn details(&self) -> ServiceDetails {
        ServiceDetails::Barbing {
            service_type: self.cut.label().to_string(),
            price: self.cut.price(),
        }
    }
}

// ---------------------------------------------------------------------------
// Charging
// ---------------------------------------------------------------------------

/// A charging-hub ticket: one or more devices on a named port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargingOrder {
    pub devices: Vec<DeviceType>,
    pub port: String,
}

impl ServiceOrder for ChargingOrder {
    fn category(&self) -> ServiceCategory {
        ServiceCategory::Charging
    }

    fn validate(&self) -> Result<(), PosError> {
        if self.port.trim().is_empty() {
            return Err(PosError::Validation(
                "Enter the charging port number".to_string(),
            ));
        }
        Ok(())
    }

    fn line_items(&self) -> Vec<LineItem> {
        self.devices
            .iter()
            .map(|device| LineItem {
                label: device.label().to_string(),
                quantity: 1,
                price: device.price(),
                tag: "charging",
            })
            .collect()
    }

    fn details(&self) -> ServiceDetails {
        ServiceDetails::Charging {
            devices: self
                .devices
                .iter()
                .map(|device| DeviceLine {
                    device_type: device.label().to_string(),
                    price: device.price(),
                })
                .collect(),
            port_number: self.port.trim().to_string(),
            price: self.total(),
        }
    }
}

// ---------------------------------------------------------------------------
// Computer services
// ---------------------------------------------------------------------------

/// An enable flag plus a page/item count, as the form presents it.
/// Disabled-with-quantity and enabled-at-zero both mean "not selected".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Selection {
    pub enabled: bool,
    pub quantity: u32,
}

impl Selection {
    pub fn on(quantity: u32) -> Self {
        Self {
            enabled: true,
            quantity,
        }
    }

    fn count(self) -> Option<u32> {
        (self.enabled && self.quantity > 0).then_some(self.quantity)
    }
}

/// A computer-services ticket: five independent sub-categories merged into
/// one flat cart (printing, copying, scanning, binding, lamination).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComputerOrder {
    pub print_bw: Selection,
    pub print_color: Selection,
    pub copy_bw_single: Selection,
    pub copy_bw_double: Selection,
    pub copy_color_single: Selection,
    pub copy_color_double: Selection,
    pub scan_standard: Selection,
    pub binding_comb: Selection,
    pub binding_wire: Selection,
    pub lamination_a4: Selection,
    pub lamination_a3: Selection,
}

impl ComputerOrder {
    fn push_pages(items: &mut Vec<LineItem>, sel: Selection, label: &str, per_page: f64, tag: &'static str) {
        if let Some(pages) = sel.count() {
            items.push(LineItem {
                label: format!("{label} ({pages} pages)"),
                quantity: pages,
                price: per_page * f64::from(pages),
                tag,
            });
        }
    }
}

impl ServiceOrder for ComputerOrder {
    fn category(&self) -> ServiceCategory {
        ServiceCategory::Computer
    }

    fn line_items(&self) -> Vec<LineItem> {
        let mut items = Vec::new();

        Self::push_pages(
            &mut items,
            self.print_bw,
            PrintService::Bw.label(),
            PrintService::Bw.price_per_page(),
            "printing",
        );
        Self::push_pages(
            &mut items,
            self.print_color,
            PrintService::Color.label(),
            PrintService::Color.price_per_page(),
            "printing",
        );

        for (sel, service) in [
            (self.copy_bw_single, CopyService::BwSingle),
            (self.copy_bw_double, CopyService::BwDouble),
            (self.copy_color_single, CopyService::ColorSingle),
            (self.copy_color_double, CopyService::ColorDouble),
        ] {
            Self::push_pages(
                &mut items,
                sel,
                service.label(),
                service.price_per_page(),
                "copying",
            );
        }

        Self::push_pages(
            &mut items,
            self.scan_standard,
            "Scanning",
            SCAN_PRICE_PER_PAGE,
            "scanning",
        );

        for (sel, service) in [
            (self.binding_comb, BindingService::Comb),
            (self.binding_wire, BindingService::Wire),
        ] {
            if let Some(pages) = sel.count() {
                items.push(LineItem {
                    label: format!("{} ({pages} pages)", service.label()),
                    quantity: pages,
                    price: service.price_for_pages(pages),
                    tag: "binding",
                });
            }
        }

        for (sel, service) in [
            (self.lamination_a4, LaminationService::A4),
            (self.lamination_a3, LaminationService::A3),
        ] {
            if let Some(count) = sel.count() {
                items.push(LineItem {
                    label: format!("{} ({count} items)", service.label()),
                    quantity: count,
                    price: service.price_per_item() * f64::from(count),
                    tag: "lamination",
                });
            }
        }

        items
    }

    fn details(&self) -> ServiceDetails {
        let services: Vec<ComputerLine> = self
            .line_items()
            .into_iter()
            .map(|item| ComputerLine {
                name: item.label,
                price: item.price,
                quantity: item.quantity,
                tag: item.tag.to_string(),
            })
            .collect();
        let total_services = services.len();
        ServiceDetails::Computer {
            services,
            total_services,
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
