//! Tax/pour decomposition.
//!
//! Cocktails expand into one pour per recipe component. Straight pours are
//! recorded against the default pour size. Packaged drinks carry tax but no
//! pours. Tax is accumulated exactly and rounded once, on the total.
//!
//! A line whose drink (or one of whose recipe components) is missing from the
//! catalog contributes zero for the missing part and is logged; the rest of
//! the order is still calculated.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use pourline_core::{DrinkId, PourSizeId};
use pourline_inventory::{Drink, ServingKind};
use pourline_sales::OrderLine;

use crate::catalog::TaxCatalog;
use crate::rounding::round_to_minor;

/// One pour to be written to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PourTracking {
    /// Drink poured from a bottle (the ingredient for cocktails).
    pub drink_id: DrinkId,
    /// Drink that was ordered.
    pub ordered_drink_id: DrinkId,
    /// Set for straight pours; cocktail components use recipe volumes.
    pub pour_size_id: Option<PourSizeId>,
    pub volume_oz: Decimal,
    /// Exact tax attributed to this pour, in minor units.
    pub tax: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxBreakdown {
    /// `exact_tax` rounded half away from zero.
    pub total_tax: i64,
    pub exact_tax: Decimal,
    pub pours: Vec<PourTracking>,
}

/// Compute total tax and pour records for `lines`.
pub fn calculate<C: TaxCatalog + ?Sized>(lines: &[OrderLine], catalog: &C) -> TaxBreakdown {
    let mut exact_tax = Decimal::ZERO;
    let mut pours = Vec::new();

    for line in lines {
        let Some(drink) = catalog.drink(line.drink_id) else {
            tracing::warn!(drink_id = %line.drink_id, "drink missing from catalog; line taxed as zero");
            continue;
        };
        let quantity = Decimal::from(line.quantity);

        match drink.serving {
            ServingKind::Cocktail => {
                exact_tax += expand_cocktail(drink, quantity, catalog, &mut pours);
            }
            ServingKind::Pour => {
                let tax = unit_tax(drink, catalog) * quantity;
                exact_tax += tax;
                match catalog.default_pour_size() {
                    Some(size) => pours.push(PourTracking {
                        drink_id: drink.id,
                        ordered_drink_id: drink.id,
                        pour_size_id: Some(size.id),
                        volume_oz: size.volume_oz * quantity,
                        tax,
                    }),
                    None => {
                        tracing::warn!(drink_id = %drink.id, "no default pour size; pour not tracked");
                    }
                }
            }
            ServingKind::Packaged => {
                exact_tax += unit_tax(drink, catalog) * quantity;
            }
        }
    }

    TaxBreakdown { total_tax: round_to_minor(exact_tax), exact_tax, pours }
}

/// Exact tax for a manual pour of `size_volume` when the drink's price is
/// quoted for `default_volume`.
pub fn scaled_pour_tax(price: i64, rate: Decimal, size_volume: Decimal, default_volume: Decimal) -> Decimal {
    if default_volume <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    Decimal::from(price) * (size_volume / default_volume) * rate / Decimal::ONE_HUNDRED
}

fn unit_tax<C: TaxCatalog + ?Sized>(drink: &Drink, catalog: &C) -> Decimal {
    Decimal::from(drink.price) * catalog.tax_rate_for(drink) / Decimal::ONE_HUNDRED
}

fn expand_cocktail<C: TaxCatalog + ?Sized>(
    cocktail: &Drink,
    quantity: Decimal,
    catalog: &C,
    pours: &mut Vec<PourTracking>,
) -> Decimal {
    let Some(recipe) = catalog.recipe(cocktail.id) else {
        tracing::warn!(drink_id = %cocktail.id, "cocktail has no recipe; line taxed as zero");
        return Decimal::ZERO;
    };

    let mut line_tax = Decimal::ZERO;
    for component in &recipe.components {
        let Some(ingredient) = catalog.drink(component.ingredient_id) else {
            tracing::warn!(
                drink_id = %cocktail.id,
                ingredient_id = %component.ingredient_id,
                "recipe ingredient missing from catalog; component taxed as zero"
            );
            continue;
        };
        let tax = unit_tax(ingredient, catalog) * component.quantity * quantity;
        line_tax += tax;
        pours.push(PourTracking {
            drink_id: ingredient.id,
            ordered_drink_id: cocktail.id,
            pour_size_id: None,
            volume_oz: component.quantity * quantity,
            tax,
        });
    }
    line_tax
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogSnapshot;
    use pourline_core::TaxCategoryId;
    use pourline_inventory::{PourSize, Recipe, RecipeComponent, TaxCategory};
    use proptest::prelude::*;

    fn percent(basis_points: i64) -> Decimal {
        Decimal::new(basis_points, 2)
    }

    fn oz(tenths: i64) -> Decimal {
        Decimal::new(tenths, 1)
    }

    fn test_drink(name: &str, price: i64, serving: ServingKind, tax: &TaxCategory) -> Drink {
        Drink::new(DrinkId::new(), name, "bar", price, 50, serving)
            .unwrap()
            .with_tax_category(tax.id)
    }

    struct Bar {
        catalog: CatalogSnapshot,
        rum: Drink,
        syrup: Drink,
        mojito: Drink,
        bourbon: Drink,
        water: Drink,
        single: PourSize,
    }

    fn test_bar() -> Bar {
        let liquor = TaxCategory::new(TaxCategoryId::new(), "liquor", percent(825)).unwrap();
        let mixer = TaxCategory::new(TaxCategoryId::new(), "mixer", percent(500)).unwrap();
        let exempt = TaxCategory::new(TaxCategoryId::new(), "exempt", Decimal::ZERO).unwrap();
        let single = PourSize::new(PourSizeId::new(), "single", oz(15), true).unwrap();

        let rum = test_drink("White Rum", 800, ServingKind::Pour, &liquor);
        let syrup = test_drink("Simple Syrup", 100, ServingKind::Pour, &mixer);
        let mojito = test_drink("Mojito", 1200, ServingKind::Cocktail, &liquor);
        let bourbon = test_drink("Bourbon", 333, ServingKind::Pour, &liquor);
        let water = test_drink("Bottled Water", 300, ServingKind::Packaged, &exempt);

        let recipe = Recipe::new(
            mojito.id,
            vec![
                RecipeComponent { ingredient_id: rum.id, quantity: oz(20) },
                RecipeComponent { ingredient_id: syrup.id, quantity: oz(5) },
            ],
        )
        .unwrap();

        let catalog = CatalogSnapshot::default()
            .with_tax_category(liquor)
            .with_tax_category(mixer)
            .with_tax_category(exempt)
            .with_default_pour_size(single.clone())
            .with_drink(rum.clone())
            .with_drink(syrup.clone())
            .with_drink(mojito.clone())
            .with_drink(bourbon.clone())
            .with_drink(water.clone())
            .with_recipe(recipe);

        Bar { catalog, rum, syrup, mojito, bourbon, water, single }
    }

    fn line(drink: &Drink, quantity: i64) -> OrderLine {
        OrderLine { drink_id: drink.id, quantity }
    }

    #[test]
    fn cocktail_expands_into_one_pour_per_component_scaled_by_quantity() {
        let bar = test_bar();
        let result = calculate(&[line(&bar.mojito, 2), line(&bar.water, 1)], &bar.catalog);

        assert_eq!(result.pours.len(), 2);
        let rum = result.pours.iter().find(|p| p.drink_id == bar.rum.id).unwrap();
        let syrup = result.pours.iter().find(|p| p.drink_id == bar.syrup.id).unwrap();
        assert_eq!(rum.volume_oz, oz(40));
        assert_eq!(syrup.volume_oz, oz(10));
        assert_eq!(rum.ordered_drink_id, bar.mojito.id);
        assert_eq!(rum.pour_size_id, None);

        // rum: 800 * 2.0 * 8.25% * 2 = 264; syrup: 100 * 0.5 * 5% * 2 = 5
        assert_eq!(rum.tax, Decimal::from(264));
        assert_eq!(syrup.tax, Decimal::from(5));
        assert_eq!(result.total_tax, 269);
    }

    #[test]
    fn straight_pour_uses_default_pour_size() {
        let bar = test_bar();
        let result = calculate(&[line(&bar.rum, 3)], &bar.catalog);

        assert_eq!(result.pours.len(), 1);
        assert_eq!(result.pours[0].pour_size_id, Some(bar.single.id));
        assert_eq!(result.pours[0].volume_oz, oz(45));
        // 800 * 8.25% * 3 = 198
        assert_eq!(result.total_tax, 198);
    }

    #[test]
    fn packaged_items_carry_tax_but_no_pours() {
        let mut bar = test_bar();
        let taxed = TaxCategory::new(TaxCategoryId::new(), "sales", percent(1000)).unwrap();
        let soda = test_drink("Cola", 250, ServingKind::Packaged, &taxed);
        bar.catalog = bar.catalog.with_tax_category(taxed).with_drink(soda.clone());

        let result = calculate(&[line(&soda, 2)], &bar.catalog);
        assert!(result.pours.is_empty());
        assert_eq!(result.total_tax, 50);
    }

    #[test]
    fn drink_without_tax_category_is_taxed_at_zero() {
        let bar = test_bar();
        let mut plain = bar.bourbon.clone();
        plain.id = DrinkId::new();
        plain.tax_category_id = None;
        let catalog = bar.catalog.clone().with_drink(plain.clone());

        let result = calculate(&[line(&plain, 2)], &catalog);
        assert_eq!(result.total_tax, 0);
        assert_eq!(result.pours.len(), 1);
    }

    #[test]
    fn total_is_rounded_once_not_per_line() {
        let bar = test_bar();
        // 333 * 8.25% = 27.4725 per line; per-line rounding would give 81.
        let lines = vec![line(&bar.bourbon, 1), line(&bar.bourbon, 1), line(&bar.bourbon, 1)];
        let result = calculate(&lines, &bar.catalog);
        assert_eq!(result.exact_tax, Decimal::new(824175, 4));
        assert_eq!(result.total_tax, 82);

        let single_line = calculate(&[line(&bar.bourbon, 3)], &bar.catalog);
        assert_eq!(single_line.total_tax, 82);
    }

    #[test]
    fn missing_drink_contributes_zero_without_aborting() {
        let bar = test_bar();
        let ghost = OrderLine { drink_id: DrinkId::new(), quantity: 4 };
        let result = calculate(&[ghost, line(&bar.rum, 1)], &bar.catalog);
        assert_eq!(result.total_tax, 66);
        assert_eq!(result.pours.len(), 1);
    }

    #[test]
    fn missing_recipe_component_only_drops_that_component() {
        let mut bar = test_bar();
        bar.catalog.drinks.remove(&bar.syrup.id);
        let result = calculate(&[line(&bar.mojito, 1)], &bar.catalog);
        assert_eq!(result.pours.len(), 1);
        assert_eq!(result.pours[0].drink_id, bar.rum.id);
        assert_eq!(result.total_tax, 132);
    }

    #[test]
    fn scaled_pour_tax_follows_volume_ratio() {
        // double of an 800 liquor pour at 8.25%: 800 * 2 * 0.0825 = 132
        let tax = scaled_pour_tax(800, percent(825), oz(30), oz(15));
        assert_eq!(tax, Decimal::from(132));
        assert_eq!(scaled_pour_tax(800, percent(825), oz(30), Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn cocktail_without_recipe_is_taxed_as_zero() {
        let mut bar = test_bar();
        bar.catalog.recipes.clear();
        let result = calculate(&[line(&bar.mojito, 1)], &bar.catalog);
        assert!(result.pours.is_empty());
        assert_eq!(result.total_tax, 0);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            .. ProptestConfig::default()
        })]

        #[test]
        fn prop_calculation_is_deterministic(
            picks in proptest::collection::vec((0usize..5, 1i64..=99), 0..20)
        ) {
            let bar = test_bar();
            let drinks = [&bar.rum, &bar.syrup, &bar.mojito, &bar.bourbon, &bar.water];
            let lines: Vec<OrderLine> = picks.iter().map(|(i, q)| line(drinks[*i], *q)).collect();

            let first = calculate(&lines, &bar.catalog);
            let second = calculate(&lines, &bar.catalog);
            prop_assert_eq!(&first, &second);
        }

        #[test]
        fn prop_total_is_exact_sum_rounded_once(
            quantities in proptest::collection::vec(1i64..=99, 1..20)
        ) {
            let bar = test_bar();
            let lines: Vec<OrderLine> = quantities.iter().map(|q| line(&bar.bourbon, *q)).collect();
            let result = calculate(&lines, &bar.catalog);

            let pour_sum: Decimal = result.pours.iter().map(|p| p.tax).sum();
            prop_assert_eq!(pour_sum, result.exact_tax);
            prop_assert_eq!(result.total_tax, round_to_minor(result.exact_tax));
            prop_assert!((Decimal::from(result.total_tax) - result.exact_tax).abs() <= Decimal::new(5, 1));
        }
    }
}
