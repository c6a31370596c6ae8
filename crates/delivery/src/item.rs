use dronedispatch_core::{AggregateRoot, DomainError};

dronedispatch_core::aggregate_id!(
    /// Catalog item identifier.
    ItemId
);

/// Catalog entry an order can request. Read-only reference data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    id: ItemId,
    title: String,
    /// Price in smallest currency unit.
    price: u64,
    version: u64,
}

impl Item {
    pub fn new(id: ItemId, title: impl Into<String>, price: u64) -> Result<Self, DomainError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(DomainError::validation("item title must not be empty"));
        }
        Ok(Self {
            id,
            title,
            price,
            version: 0,
        })
    }

    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    pub fn id_typed(&self) -> ItemId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn price(&self) -> u64 {
        self.price
    }
}

impl AggregateRoot for Item {
    type Id = ItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_title_is_rejected() {
        let err = Item::new(ItemId::generate(), "  ", 65).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn keeps_title_and_price() {
        let item = Item::new(ItemId::generate(), "Margherita", 65).unwrap();
        assert_eq!(item.title(), "Margherita");
        assert_eq!(item.price(), 65);
    }
}
