use serde::{Deserialize, Serialize};

use pourline_core::{DomainError, DrinkId, TaxCategoryId};

/// How a drink is dispensed, which decides how it is taxed and tracked.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServingKind {
    /// Sold as a discrete unit (bottled water, canned beer). Never pour-tracked.
    Packaged,
    /// Poured straight from a tracked bottle at the default pour size.
    Pour,
    /// Composite drink expanded through its recipe into ingredient pours.
    Cocktail,
}

impl ServingKind {
    pub fn is_pour_tracked(self) -> bool {
        matches!(self, Self::Pour | Self::Cocktail)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Packaged => "packaged",
            Self::Pour => "pour",
            Self::Cocktail => "cocktail",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "packaged" => Some(Self::Packaged),
            "pour" => Some(Self::Pour),
            "cocktail" => Some(Self::Cocktail),
            _ => None,
        }
    }
}

/// Catalog drink with its unit stock and cumulative sales.
///
/// `price` is in minor currency units. `inventory` and `sales` are only moved
/// together through [`Drink::reserve`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Drink {
    pub id: DrinkId,
    pub name: String,
    pub category: String,
    pub subcategory: Option<String>,
    pub price: i64,
    pub inventory: i64,
    pub sales: i64,
    pub serving: ServingKind,
    pub tax_category_id: Option<TaxCategoryId>,
}

impl Drink {
    pub fn new(
        id: DrinkId,
        name: impl Into<String>,
        category: impl Into<String>,
        price: i64,
        inventory: i64,
        serving: ServingKind,
    ) -> Result<Self, DomainError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if price < 0 {
            return Err(DomainError::validation("price cannot be negative"));
        }
        if inventory < 0 {
            return Err(DomainError::validation("inventory cannot be negative"));
        }
        Ok(Self {
            id,
            name,
            category: category.into(),
            subcategory: None,
            price,
            inventory,
            sales: 0,
            serving,
            tax_category_id: None,
        })
    }

    pub fn with_subcategory(mut self, subcategory: impl Into<String>) -> Self {
        self.subcategory = Some(subcategory.into());
        self
    }

    pub fn with_tax_category(mut self, tax_category_id: TaxCategoryId) -> Self {
        self.tax_category_id = Some(tax_category_id);
        self
    }

    pub fn can_fulfil(&self, quantity: i64) -> bool {
        quantity > 0 && self.inventory >= quantity
    }

    /// Take `quantity` units out of stock and count them as sold.
    pub fn reserve(&mut self, quantity: i64) -> Result<(), DomainError> {
        if quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if self.inventory < quantity {
            return Err(DomainError::invariant("inventory cannot go negative"));
        }
        self.inventory -= quantity;
        self.sales += quantity;
        Ok(())
    }
}
