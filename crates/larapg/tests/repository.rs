mod common;

use common::ScratchDb;
use larapg::{AllowList, Crud, Entity, OrmError, OrmResult, Record, Repository, Value};

struct Product;

impl Entity for Product {
    const TABLE: &'static str = "products";
}

const PRODUCTS: &str = r#"
CREATE TABLE IF NOT EXISTS products (
    id SERIAL PRIMARY KEY,
    product_image VARCHAR(255),
    product_name VARCHAR(255) NOT NULL UNIQUE,
    product_price NUMERIC(12, 2),
    created_at TIMESTAMP NOT NULL DEFAULT NOW(),
    deleted_at TIMESTAMP NULL
);
"#;

#[tokio::test]
async fn product_crud_roundtrip() -> OrmResult<()> {
    let Some(db) = ScratchDb::connect("repository_crud").await? else {
        return Ok(());
    };
    db.client
        .batch_execute(PRODUCTS)
        .await
        .map_err(OrmError::from_db_error)?;

    let allow = AllowList::new(["users", "products"])?;
    let products = Repository::of::<Product>(&db.client, &allow)?;

    let lamp = products
        .create(
            Record::new()
                .set("product_name", "Lamp")
                .set("product_price", "12.50")
                .set("product_image", "lamp.png"),
        )
        .await?;
    let id = lamp.get("id").and_then(Value::as_i64).expect("id");
    assert_eq!(lamp.get("product_price"), Some(&Value::from("12.50")));

    for name in ["Desk", "Chair", "Shelf"] {
        products.create(Record::new().set("product_name", name)).await?;
    }

    // Hostile text is stored verbatim, never executed.
    let payload = "'); DROP TABLE products; --";
    let hostile = products.create(Record::new().set("product_name", payload)).await?;
    assert_eq!(hostile.get("product_name"), Some(&Value::from(payload)));

    let found = products.find(id).await?.expect("lamp exists");
    assert_eq!(found.get("product_name"), Some(&Value::from("Lamp")));
    assert!(products.find(9_999).await?.is_none());

    let updated = products
        .update(id, Record::new().set("product_price", 15))
        .await?
        .expect("row updated");
    assert_eq!(updated.get("product_price"), Some(&Value::from("15.00")));

    let page = products.paginate(1, 2).await?;
    let ids: Vec<i64> = page.iter().filter_map(|r| r.get("id")?.as_i64()).collect();
    assert_eq!(ids.len(), 2);
    assert_eq!(ids[0], id);
    assert!(ids[0] < ids[1]);
    assert_eq!(products.paginate(3, 2).await?.len(), 1);

    let deleted = products.soft_delete(id).await?.expect("row soft-deleted");
    assert!(!deleted.get("deleted_at").is_some_and(Value::is_null));
    assert!(products.find(id).await?.is_none());
    assert_eq!(products.all().await?.len(), 5);
    assert_eq!(products.paginate(1, 10).await?.len(), 4);

    assert_eq!(products.delete(id).await?, 1);
    assert_eq!(products.delete(id).await?, 0);

    let dup = products
        .create(Record::new().set("product_name", "Desk"))
        .await
        .unwrap_err();
    assert!(dup.is_unique_violation());
    assert!(dup.is_persistence());

    db.cleanup().await
}

#[tokio::test]
async fn unlisted_table_is_rejected_before_any_query() -> OrmResult<()> {
    let Some(db) = ScratchDb::connect("repository_allow").await? else {
        return Ok(());
    };

    let allow = AllowList::new(["products"])?;
    let err = Repository::new(&db.client, &allow, "pg_user").err().expect("rejected");
    assert!(matches!(err, OrmError::InvalidTable(_)));

    db.cleanup().await
}
