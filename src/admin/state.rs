use dashmap::DashMap;
use rust_decimal::Decimal;

/// What the add-product wizard asks for next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductField {
    Name,
    Price,
    Description,
    Quantity,
    FirstImage,
    SecondImageChoice,
    SecondImage,
    Coordinates,
}

/// Answers collected so far by the add-product wizard. Fields are filled
/// strictly in step order, so earlier ones are always set when read.
#[derive(Debug, Clone, Default)]
pub struct ProductDraft {
    pub name: String,
    pub price: Decimal,
    pub description: String,
    pub quantity: i32,
    pub image1: Option<String>,
    pub image2: Option<String>,
    pub coordinates: Option<String>,
}

/// What the payment-method wizard asks for next. Editing an existing
/// method starts straight at the address step with the currency preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentField {
    Currency,
    Address,
    Network,
}

#[derive(Debug, Clone, Default)]
pub struct PaymentDraft {
    pub currency: String,
    pub address: String,
}

/// A multi-step operator conversation in progress. At most one per
/// operator; starting a new wizard replaces the old one.
#[derive(Debug, Clone)]
pub enum AdminWizard {
    AddProduct {
        step: ProductField,
        draft: ProductDraft,
    },
    PaymentMethod {
        step: PaymentField,
        draft: PaymentDraft,
    },
    EditContent {
        key: String,
    },
}

/// Live operator wizards keyed by the operator's client id.
#[derive(Debug, Default)]
pub struct AdminStateStore {
    wizards: DashMap<i64, AdminWizard>,
}

impl AdminStateStore {
    pub fn new() -> Self {
        Self {
            wizards: DashMap::new(),
        }
    }

    pub fn get(&self, operator_id: i64) -> Option<AdminWizard> {
        self.wizards
            .get(&operator_id)
            .map(|entry| entry.value().clone())
    }

    pub fn put(&self, operator_id: i64, wizard: AdminWizard) {
        self.wizards.insert(operator_id, wizard);
    }

    pub fn clear(&self, operator_id: i64) {
        self.wizards.remove(&operator_id);
    }

    pub fn is_active(&self, operator_id: i64) -> bool {
        self.wizards.contains_key(&operator_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_new_wizard_replaces_the_old_one() {
        let store = AdminStateStore::new();
        store.put(
            1,
            AdminWizard::AddProduct {
                step: ProductField::Name,
                draft: ProductDraft::default(),
            },
        );
        store.put(
            1,
            AdminWizard::EditContent {
                key: "welcome_message".to_string(),
            },
        );

        match store.get(1) {
            Some(AdminWizard::EditContent { key }) => assert_eq!(key, "welcome_message"),
            other => panic!("unexpected wizard: {:?}", other),
        }
    }

    #[test]
    fn clear_ends_the_conversation() {
        let store = AdminStateStore::new();
        store.put(
            1,
            AdminWizard::PaymentMethod {
                step: PaymentField::Currency,
                draft: PaymentDraft::default(),
            },
        );
        assert!(store.is_active(1));

        store.clear(1);
        assert!(!store.is_active(1));
        assert!(store.get(1).is_none());
    }
}
