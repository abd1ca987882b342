#![allow(dead_code)]
use log::*;
use oms_common::Money;
use oms_engine::{
    db_types::{NewCoupon, NewOrder, NewOrderItem, NewProduct, PaymentGateway, Product},
    events::EventProducers,
    CatalogApi,
    CatalogManagement,
    EngineConfig,
    InventoryApi,
    OrderFlowApi,
    PaymentApi,
    ReconciliationApi,
    SqliteDatabase,
};
use sqlx::{migrate::MigrateDatabase, Sqlite};

pub fn random_db_url() -> String {
    let path = std::env::temp_dir().join(format!("oms_test_{}.db", rand::random::<u64>()));
    format!("sqlite://{}", path.display())
}

pub async fn prepare_test_env(url: &str) -> SqliteDatabase {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    if let Err(e) = Sqlite::drop_database(url).await {
        trace!("🚀️ Nothing to drop at {url}: {e}");
    }
    Sqlite::create_database(url).await.expect("Error creating database");
    let db = SqliteDatabase::from_config(&EngineConfig::new(url)).await.expect("Error creating connection to database");
    db.run_migrations().await.expect("Error running DB migrations");
    debug!("🚀️ Test database ready at {url}");
    db
}

pub async fn tear_down(db: SqliteDatabase) {
    let url = db.url().to_string();
    db.close().await;
    if let Err(e) = Sqlite::drop_database(&url).await {
        warn!("🚀️ Could not remove test database {url}: {e}");
    }
}

/// A test system with every API wired to the same database.
pub struct TestSystem {
    pub db: SqliteDatabase,
    pub orders: OrderFlowApi<SqliteDatabase>,
    pub payments: PaymentApi<SqliteDatabase>,
    pub inventory: InventoryApi<SqliteDatabase>,
    pub bank: ReconciliationApi<SqliteDatabase>,
    pub catalog: CatalogApi<SqliteDatabase>,
}

impl TestSystem {
    pub async fn new() -> Self {
        Self::with_producers(EventProducers::default()).await
    }

    pub async fn with_producers(producers: EventProducers) -> Self {
        let db = prepare_test_env(&random_db_url()).await;
        Self {
            orders: OrderFlowApi::new(db.clone(), producers.clone()),
            payments: PaymentApi::new(db.clone(), producers.clone()),
            inventory: InventoryApi::new(db.clone()),
            bank: ReconciliationApi::new(db.clone(), producers),
            catalog: CatalogApi::new(db.clone()),
            db,
        }
    }

    pub async fn shutdown(self) {
        tear_down(self.db).await;
    }
}

/// The catalogue used throughout the tests: a shirt at 50,000, a mug at 30,000 and the `SAVE10` coupon.
pub struct Catalog {
    pub shirt: Product,
    pub mug: Product,
}

pub async fn seed_catalog(db: &SqliteDatabase, stock: i64) -> Catalog {
    let shirt = db
        .insert_product(NewProduct::new("SHIRT-01", "Linen shirt", Money::from(50_000)), stock)
        .await
        .expect("Error inserting product");
    let mug = db
        .insert_product(NewProduct::new("MUG-01", "Enamel mug", Money::from(30_000)), stock)
        .await
        .expect("Error inserting product");
    db.insert_coupon(NewCoupon::percentage("SAVE10", 10)).await.expect("Error inserting coupon");
    Catalog { shirt, mug }
}

/// Two shirts and a mug, to be paid on delivery.
pub fn cod_order(customer: &str, catalog: &Catalog) -> NewOrder {
    NewOrder::new(
        customer,
        vec![NewOrderItem::new(catalog.shirt.id, 2), NewOrderItem::new(catalog.mug.id, 1)],
        PaymentGateway::cash_on_delivery(),
    )
}
