use std::collections::HashMap;

use rust_decimal::Decimal;

use pourline_core::{DrinkId, TaxCategoryId};
use pourline_inventory::{Drink, PourSize, Recipe, TaxCategory};

/// Read-only catalog view the calculator works against.
pub trait TaxCatalog {
    fn drink(&self, id: DrinkId) -> Option<&Drink>;

    fn recipe(&self, drink_id: DrinkId) -> Option<&Recipe>;

    fn tax_category(&self, id: TaxCategoryId) -> Option<&TaxCategory>;

    fn default_pour_size(&self) -> Option<&PourSize>;

    /// Tax rate for a drink as a percentage; `0` without a category.
    fn tax_rate_for(&self, drink: &Drink) -> Decimal {
        drink
            .tax_category_id
            .and_then(|id| self.tax_category(id))
            .map(|c| c.rate)
            .unwrap_or(Decimal::ZERO)
    }
}

/// Owned catalog data loaded once per commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogSnapshot {
    pub drinks: HashMap<DrinkId, Drink>,
    pub recipes: HashMap<DrinkId, Recipe>,
    pub tax_categories: HashMap<TaxCategoryId, TaxCategory>,
    pub default_pour_size: Option<PourSize>,
}

impl CatalogSnapshot {
    pub fn with_drink(mut self, drink: Drink) -> Self {
        self.drinks.insert(drink.id, drink);
        self
    }

    pub fn with_recipe(mut self, recipe: Recipe) -> Self {
        self.recipes.insert(recipe.drink_id, recipe);
        self
    }

    pub fn with_tax_category(mut self, category: TaxCategory) -> Self {
        self.tax_categories.insert(category.id, category);
        self
    }

    pub fn with_default_pour_size(mut self, size: PourSize) -> Self {
        self.default_pour_size = Some(size);
        self
    }
}

impl TaxCatalog for CatalogSnapshot {
    fn drink(&self, id: DrinkId) -> Option<&Drink> {
        self.drinks.get(&id)
    }

    fn recipe(&self, drink_id: DrinkId) -> Option<&Recipe> {
        self.recipes.get(&drink_id)
    }

    fn tax_category(&self, id: TaxCategoryId) -> Option<&TaxCategory> {
        self.tax_categories.get(&id)
    }

    fn default_pour_size(&self) -> Option<&PourSize> {
        self.default_pour_size.as_ref()
    }
}
