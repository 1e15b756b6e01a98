use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rust_decimal::Decimal;

use pourline_core::{DrinkId, PourSizeId, TaxCategoryId};
use pourline_inventory::{Drink, PourSize, Recipe, RecipeComponent, ServingKind, TaxCategory};
use pourline_sales::OrderLine;
use pourline_tax::{CatalogSnapshot, calculate};

/// Catalog with `n` cocktails of three components each plus their spirits.
fn build_catalog(n: usize) -> (CatalogSnapshot, Vec<DrinkId>) {
    let liquor = TaxCategory::new(TaxCategoryId::new(), "liquor", Decimal::new(825, 2)).unwrap();
    let single = PourSize::new(PourSizeId::new(), "single", Decimal::new(15, 1), true).unwrap();
    let mut catalog = CatalogSnapshot::default()
        .with_default_pour_size(single)
        .with_tax_category(liquor.clone());
    let mut orderable = Vec::new();

    for i in 0..n {
        let spirits: Vec<Drink> = (0..3)
            .map(|j| {
                Drink::new(DrinkId::new(), format!("spirit-{i}-{j}"), "spirits", 700 + j, 100, ServingKind::Pour)
                    .unwrap()
                    .with_tax_category(liquor.id)
            })
            .collect();
        let cocktail = Drink::new(DrinkId::new(), format!("cocktail-{i}"), "cocktails", 1300, 100, ServingKind::Cocktail)
            .unwrap()
            .with_tax_category(liquor.id);
        let recipe = Recipe::new(
            cocktail.id,
            spirits
                .iter()
                .map(|s| RecipeComponent { ingredient_id: s.id, quantity: Decimal::new(75, 2) })
                .collect(),
        )
        .unwrap();

        orderable.push(cocktail.id);
        orderable.push(spirits[0].id);
        catalog = catalog.with_recipe(recipe).with_drink(cocktail);
        for s in spirits {
            catalog = catalog.with_drink(s);
        }
    }
    (catalog, orderable)
}

fn bench_calculate_mixed_order(c: &mut Criterion) {
    let mut group = c.benchmark_group("tax_calculate");

    for lines in [4usize, 32, 256] {
        let (catalog, orderable) = build_catalog(lines);
        let order: Vec<OrderLine> = orderable
            .iter()
            .take(lines)
            .enumerate()
            .map(|(i, id)| OrderLine { drink_id: *id, quantity: (i as i64 % 5) + 1 })
            .collect();

        group.throughput(Throughput::Elements(lines as u64));
        group.bench_with_input(BenchmarkId::from_parameter(lines), &order, |b, order| {
            b.iter(|| calculate(black_box(order), black_box(&catalog)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_calculate_mixed_order);
criterion_main!(benches);
