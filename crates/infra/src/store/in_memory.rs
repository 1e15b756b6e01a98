use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use pourline_core::{DrinkId, OrderId, TaxCategoryId};
use pourline_events::StockLevel;
use pourline_inventory::{Drink, PourInventory, PourSize, PourTransaction, Recipe, TaxCategory};
use pourline_sales::{Order, OrderLine};
use pourline_tax::CatalogSnapshot;

use super::plan::{self, ManualPourRows, StockCheck};
use super::{CommitOutcome, CommittedOrder, InventoryStore, PourOutcome, PourRequest, StoreError};

#[derive(Debug, Default)]
struct State {
    drinks: HashMap<DrinkId, Drink>,
    recipes: HashMap<DrinkId, Recipe>,
    tax_categories: HashMap<TaxCategoryId, TaxCategory>,
    pour_sizes: Vec<PourSize>,
    /// Oldest first.
    bottles: Vec<PourInventory>,
    orders: HashMap<OrderId, Order>,
    ledger: Vec<PourTransaction>,
}

impl State {
    fn default_pour_size(&self) -> Option<&PourSize> {
        self.pour_sizes.iter().find(|s| s.is_default)
    }

    fn catalog_for(&self, drink_ids: impl IntoIterator<Item = DrinkId>) -> CatalogSnapshot {
        let mut catalog = CatalogSnapshot {
            tax_categories: self.tax_categories.clone(),
            default_pour_size: self.default_pour_size().cloned(),
            ..CatalogSnapshot::default()
        };
        for id in drink_ids {
            let Some(drink) = self.drinks.get(&id) else { continue };
            catalog.drinks.insert(drink.id, drink.clone());
            if let Some(recipe) = self.recipes.get(&drink.id) {
                for component in &recipe.components {
                    if let Some(ingredient) = self.drinks.get(&component.ingredient_id) {
                        catalog.drinks.insert(ingredient.id, ingredient.clone());
                    }
                }
                catalog.recipes.insert(drink.id, recipe.clone());
            }
        }
        catalog
    }
}

/// In-memory store.
///
/// Intended for tests/dev. One mutex guards all state, so every commit is
/// serialized against every other.
#[derive(Debug, Default)]
pub struct InMemoryInventoryStore {
    state: Mutex<State>,
    commit_fault: Mutex<Option<StoreError>>,
    completion_fault: Mutex<Option<StoreError>>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Internal("in-memory store lock poisoned".to_string()))
    }

    pub fn insert_drink(&self, drink: Drink) -> Result<(), StoreError> {
        self.lock()?.drinks.insert(drink.id, drink);
        Ok(())
    }

    pub fn insert_recipe(&self, recipe: Recipe) -> Result<(), StoreError> {
        self.lock()?.recipes.insert(recipe.drink_id, recipe);
        Ok(())
    }

    pub fn insert_tax_category(&self, category: TaxCategory) -> Result<(), StoreError> {
        self.lock()?.tax_categories.insert(category.id, category);
        Ok(())
    }

    pub fn insert_pour_size(&self, size: PourSize) -> Result<(), StoreError> {
        self.lock()?.pour_sizes.push(size);
        Ok(())
    }

    pub fn insert_bottle(&self, bottle: PourInventory) -> Result<(), StoreError> {
        self.lock()?.bottles.push(bottle);
        Ok(())
    }

    pub fn drink(&self, id: DrinkId) -> Result<Option<Drink>, StoreError> {
        Ok(self.lock()?.drinks.get(&id).cloned())
    }

    pub fn bottles(&self) -> Result<Vec<PourInventory>, StoreError> {
        Ok(self.lock()?.bottles.clone())
    }

    pub fn ledger(&self) -> Result<Vec<PourTransaction>, StoreError> {
        Ok(self.lock()?.ledger.clone())
    }

    /// Make the next `commit_order` fail with `err` before touching state.
    pub fn fail_next_commit(&self, err: StoreError) {
        if let Ok(mut fault) = self.commit_fault.lock() {
            *fault = Some(err);
        }
    }

    /// Make the next `complete_order` fail with `err`.
    pub fn fail_next_completion(&self, err: StoreError) {
        if let Ok(mut fault) = self.completion_fault.lock() {
            *fault = Some(err);
        }
    }

    fn take_fault(slot: &Mutex<Option<StoreError>>) -> Option<StoreError> {
        slot.lock().ok().and_then(|mut f| f.take())
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn list_drinks(&self) -> Result<Vec<Drink>, StoreError> {
        let state = self.lock()?;
        let mut drinks: Vec<Drink> = state.drinks.values().cloned().collect();
        drinks.sort_by(|a, b| a.category.cmp(&b.category).then_with(|| a.name.cmp(&b.name)));
        Ok(drinks)
    }

    async fn list_pour_sizes(&self) -> Result<Vec<PourSize>, StoreError> {
        Ok(self.lock()?.pour_sizes.clone())
    }

    async fn load_tax_catalog(&self, drink_ids: &[DrinkId]) -> Result<CatalogSnapshot, StoreError> {
        Ok(self.lock()?.catalog_for(drink_ids.iter().copied()))
    }

    async fn commit_order(
        &self,
        order_id: OrderId,
        lines: &[OrderLine],
        at: DateTime<Utc>,
    ) -> Result<CommitOutcome, StoreError> {
        if let Some(err) = Self::take_fault(&self.commit_fault) {
            return Err(err);
        }

        let mut state = self.lock()?;

        match plan::check_stock(lines, &state.drinks) {
            StockCheck::Available => {}
            StockCheck::Unknown(ids) => return Ok(CommitOutcome::UnknownDrinks(ids)),
            StockCheck::Insufficient(items) => return Ok(CommitOutcome::Insufficient(items)),
        }

        let catalog = state.catalog_for(lines.iter().map(|l| l.drink_id));
        let (order, breakdown) = plan::build_order(order_id, lines, &catalog, at)?;

        // Work on copies so a failure below leaves the state untouched.
        let mut drinks = state.drinks.clone();
        let mut stock = Vec::with_capacity(lines.len());
        for line in lines {
            let drink = drinks
                .get_mut(&line.drink_id)
                .ok_or_else(|| StoreError::Internal(format!("drink {} vanished during commit", line.drink_id)))?;
            drink.reserve(line.quantity).map_err(|e| StoreError::Internal(e.to_string()))?;
            stock.push(StockLevel::from(&*drink));
        }
        let mut bottles = state.bottles.clone();
        let pours = plan::bind_pours(&breakdown.pours, &mut bottles, order_id, at);

        state.drinks = drinks;
        state.bottles = bottles;
        state.orders.insert(order.id, order.clone());
        state.ledger.extend(pours.iter().cloned());

        Ok(CommitOutcome::Committed(CommittedOrder { order, stock, pours }))
    }

    async fn complete_order(&self, order_id: OrderId, at: DateTime<Utc>) -> Result<Order, StoreError> {
        if let Some(err) = Self::take_fault(&self.completion_fault) {
            return Err(err);
        }
        let mut state = self.lock()?;
        let order = state
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| StoreError::NotFound(format!("order {order_id}")))?;
        order.complete(at).map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(order.clone())
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>, StoreError> {
        Ok(self.lock()?.orders.get(&order_id).cloned())
    }

    async fn record_pour(&self, request: PourRequest, at: DateTime<Utc>) -> Result<PourOutcome, StoreError> {
        let mut state = self.lock()?;

        let bottle = state.bottles.iter().find(|b| b.id == request.pour_inventory_id).cloned();
        let drink = bottle.as_ref().and_then(|b| state.drinks.get(&b.drink_id)).cloned();
        let rate = drink
            .as_ref()
            .and_then(|d| d.tax_category_id)
            .and_then(|id| state.tax_categories.get(&id))
            .map(|c| c.rate)
            .unwrap_or_default();
        let rows = ManualPourRows {
            bottle,
            size: state.pour_sizes.iter().find(|s| s.id == request.pour_size_id).cloned(),
            default_size: state.default_pour_size().cloned(),
            drink,
            rate,
        };

        let outcome = plan::plan_manual_pour(request, rows, at)?;
        if let PourOutcome::Recorded { transaction, bottle } = &outcome {
            if let Some(slot) = state.bottles.iter_mut().find(|b| b.id == bottle.id) {
                *slot = bottle.clone();
            }
            state.ledger.push(transaction.clone());
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::demo_catalog;

    #[tokio::test]
    async fn tax_catalog_pulls_in_recipe_ingredients() {
        let seed = demo_catalog().unwrap();
        let store = InMemoryInventoryStore::new();
        seed.load_into(&store).unwrap();

        let mojito = seed.drink_named("Mojito").unwrap();
        let catalog = store.load_tax_catalog(&[mojito.id]).await.unwrap();

        assert!(catalog.recipes.contains_key(&mojito.id));
        assert_eq!(catalog.drinks.len(), 3);
        assert!(catalog.drinks.contains_key(&seed.drink_named("White Rum").unwrap().id));
        assert_eq!(catalog.default_pour_size.as_ref().map(|s| s.name.as_str()), Some("single"));
    }

    #[tokio::test]
    async fn unknown_drinks_are_left_out_of_the_tax_catalog() {
        let store = InMemoryInventoryStore::new();
        let catalog = store.load_tax_catalog(&[DrinkId::new()]).await.unwrap();
        assert!(catalog.drinks.is_empty());
    }

    #[tokio::test]
    async fn drinks_are_listed_by_category_then_name() {
        let seed = demo_catalog().unwrap();
        let store = InMemoryInventoryStore::new();
        seed.load_into(&store).unwrap();

        let names: Vec<String> = store.list_drinks().await.unwrap().into_iter().map(|d| d.name).collect();
        assert_eq!(names, ["Mojito", "Simple Syrup", "Bottled Water", "Bourbon", "White Rum"]);
    }
}
