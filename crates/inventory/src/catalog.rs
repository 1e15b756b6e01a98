//! Reference data used to price, tax and measure pours.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use pourline_core::{DomainError, DrinkId, PourSizeId, TaxCategoryId};

/// Named tax rate. `rate` is a percentage (8.25 means 8.25%).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxCategory {
    pub id: TaxCategoryId,
    pub name: String,
    pub rate: Decimal,
}

impl TaxCategory {
    pub fn new(id: TaxCategoryId, name: impl Into<String>, rate: Decimal) -> Result<Self, DomainError> {
        if rate.is_sign_negative() {
            return Err(DomainError::validation("tax rate cannot be negative"));
        }
        Ok(Self { id, name: name.into(), rate })
    }
}

/// Standard serving volume, in ounces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PourSize {
    pub id: PourSizeId,
    pub name: String,
    pub volume_oz: Decimal,
    pub is_default: bool,
}

impl PourSize {
    pub fn new(
        id: PourSizeId,
        name: impl Into<String>,
        volume_oz: Decimal,
        is_default: bool,
    ) -> Result<Self, DomainError> {
        if volume_oz <= Decimal::ZERO {
            return Err(DomainError::validation("pour size volume must be positive"));
        }
        Ok(Self { id, name: name.into(), volume_oz, is_default })
    }
}

/// One ingredient of a cocktail: `quantity` ounces of `ingredient_id` per serve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeComponent {
    pub ingredient_id: DrinkId,
    pub quantity: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    pub drink_id: DrinkId,
    pub components: Vec<RecipeComponent>,
}

impl Recipe {
    pub fn new(drink_id: DrinkId, components: Vec<RecipeComponent>) -> Result<Self, DomainError> {
        if components.is_empty() {
            return Err(DomainError::validation("recipe needs at least one component"));
        }
        if components.iter().any(|c| c.quantity <= Decimal::ZERO) {
            return Err(DomainError::validation("recipe component quantity must be positive"));
        }
        if components.iter().any(|c| c.ingredient_id == drink_id) {
            return Err(DomainError::invariant("a drink cannot be its own ingredient"));
        }
        Ok(Self { drink_id, components })
    }
}
