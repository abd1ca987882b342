use std::collections::HashMap;

use cucumber::World;
use log::*;
use oms_engine::{
    db_types::NewOrder,
    events::EventProducers,
    traits::OrderEngineError,
    CatalogApi,
    InventoryApi,
    OrderFlowApi,
    PaymentApi,
    ReconciliationApi,
    SqliteDatabase,
};
use sqlx::{migrate::MigrateDatabase, Sqlite};

#[derive(Default, Debug, World)]
pub struct OmsWorld {
    pub system: Option<OrderManagementSystem>,
    pub cart: Option<NewOrder>,
    /// Orders by the alias used in the scenario
    pub orders: HashMap<String, i64>,
    /// Bank transactions by external transaction id
    pub bank_transactions: HashMap<String, i64>,
    pub last_error: Option<OrderEngineError>,
}

#[derive(Debug)]
pub struct OrderManagementSystem {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub orders: OrderFlowApi<SqliteDatabase>,
    pub payments: PaymentApi<SqliteDatabase>,
    pub inventory: InventoryApi<SqliteDatabase>,
    pub bank: ReconciliationApi<SqliteDatabase>,
    pub catalog: CatalogApi<SqliteDatabase>,
}

impl OmsWorld {
    pub fn system(&self) -> &OrderManagementSystem {
        self.system.as_ref().expect("The system has not been initialised")
    }

    pub fn order_id(&self, alias: &str) -> i64 {
        *self.orders.get(alias).unwrap_or_else(|| panic!("No order called {alias}"))
    }

    pub async fn product_id(&self, sku: &str) -> i64 {
        let product = self.system().catalog.product_by_sku(sku).await.expect("Error fetching product");
        product.unwrap_or_else(|| panic!("No product with SKU {sku}")).id
    }

    pub fn record<T>(&mut self, result: Result<T, OrderEngineError>) -> Option<T> {
        match result {
            Ok(v) => {
                self.last_error = None;
                Some(v)
            },
            Err(e) => {
                debug!("🚀️ Step failed as recorded: {e}");
                self.last_error = Some(e);
                None
            },
        }
    }
}

impl OrderManagementSystem {
    pub async fn new() -> Self {
        let db_path = random_db_url();
        if let Err(e) = Sqlite::drop_database(&db_path).await {
            trace!("🚀️ Nothing to drop at {db_path}: {e}");
        }
        Sqlite::create_database(&db_path).await.expect("Error creating database");
        let db = SqliteDatabase::new_with_url(&db_path, 5).await.expect("Error creating connection to database");
        db.run_migrations().await.expect("Error running DB migrations");
        debug!("🚀️ Created database: {db_path}");
        let producers = EventProducers::default();
        Self {
            db_path,
            orders: OrderFlowApi::new(db.clone(), producers.clone()),
            payments: PaymentApi::new(db.clone(), producers.clone()),
            inventory: InventoryApi::new(db.clone()),
            bank: ReconciliationApi::new(db.clone(), producers),
            catalog: CatalogApi::new(db.clone()),
            db,
        }
    }
}

fn random_db_url() -> String {
    let path = std::env::temp_dir().join(format!("oms_bdd_{}.db", rand::random::<u64>()));
    format!("sqlite://{}", path.display())
}
