//! Demo bar catalog for local runs and tests.

use rust_decimal::Decimal;

use pourline_core::{DomainError, DrinkId, PourInventoryId, PourSizeId, TaxCategoryId};
use pourline_inventory::{
    Drink, PourInventory, PourSize, Recipe, RecipeComponent, ServingKind, TaxCategory,
};

use crate::store::{InMemoryInventoryStore, StoreError};

/// Reference data and stock loaded into an empty store.
#[derive(Debug, Clone, Default)]
pub struct CatalogSeed {
    pub tax_categories: Vec<TaxCategory>,
    pub pour_sizes: Vec<PourSize>,
    pub drinks: Vec<Drink>,
    pub recipes: Vec<Recipe>,
    pub bottles: Vec<PourInventory>,
}

impl CatalogSeed {
    pub fn drink_named(&self, name: &str) -> Option<&Drink> {
        self.drinks.iter().find(|d| d.name == name)
    }

    pub fn pour_size_named(&self, name: &str) -> Option<&PourSize> {
        self.pour_sizes.iter().find(|s| s.name == name)
    }

    pub fn load_into(&self, store: &InMemoryInventoryStore) -> Result<(), StoreError> {
        for category in &self.tax_categories {
            store.insert_tax_category(category.clone())?;
        }
        for size in &self.pour_sizes {
            store.insert_pour_size(size.clone())?;
        }
        for drink in &self.drinks {
            store.insert_drink(drink.clone())?;
        }
        for recipe in &self.recipes {
            store.insert_recipe(recipe.clone())?;
        }
        for bottle in &self.bottles {
            store.insert_bottle(bottle.clone())?;
        }
        Ok(())
    }
}

fn oz(tenths: i64) -> Decimal {
    Decimal::new(tenths, 1)
}

/// A small bar: two spirits, a mixer, one cocktail and bottled water.
///
/// Fresh ids are generated on every call.
pub fn demo_catalog() -> Result<CatalogSeed, DomainError> {
    let liquor = TaxCategory::new(TaxCategoryId::new(), "liquor", Decimal::new(825, 2))?;
    let non_alcoholic = TaxCategory::new(TaxCategoryId::new(), "non-alcoholic", Decimal::ZERO)?;

    let single = PourSize::new(PourSizeId::new(), "single", oz(15), true)?;
    let double = PourSize::new(PourSizeId::new(), "double", oz(30), false)?;

    let rum = Drink::new(DrinkId::new(), "White Rum", "spirits", 800, 40, ServingKind::Pour)?
        .with_subcategory("rum")
        .with_tax_category(liquor.id);
    let bourbon = Drink::new(DrinkId::new(), "Bourbon", "spirits", 900, 30, ServingKind::Pour)?
        .with_subcategory("whiskey")
        .with_tax_category(liquor.id);
    let syrup = Drink::new(DrinkId::new(), "Simple Syrup", "mixers", 50, 100, ServingKind::Pour)?
        .with_tax_category(non_alcoholic.id);
    let mojito = Drink::new(DrinkId::new(), "Mojito", "cocktails", 1200, 25, ServingKind::Cocktail)?
        .with_subcategory("signature")
        .with_tax_category(liquor.id);
    let water = Drink::new(DrinkId::new(), "Bottled Water", "non-alcoholic", 300, 48, ServingKind::Packaged)?
        .with_tax_category(non_alcoholic.id);

    let mojito_recipe = Recipe::new(
        mojito.id,
        vec![
            RecipeComponent { ingredient_id: rum.id, quantity: oz(20) },
            RecipeComponent { ingredient_id: syrup.id, quantity: oz(5) },
        ],
    )?;

    let bottles = vec![
        PourInventory::open(PourInventoryId::new(), rum.id, "RUM-0001", oz(254))?,
        PourInventory::open(PourInventoryId::new(), bourbon.id, "BRB-0001", oz(254))?,
        PourInventory::open(PourInventoryId::new(), syrup.id, "SYR-0001", oz(338))?,
    ];

    Ok(CatalogSeed {
        tax_categories: vec![liquor, non_alcoholic],
        pour_sizes: vec![single, double],
        drinks: vec![rum, bourbon, syrup, mojito, water],
        recipes: vec![mojito_recipe],
        bottles,
    })
}
