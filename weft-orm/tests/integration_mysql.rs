#![cfg(feature = "mysql")]

use sqlx::MySqlPool;
use weft_orm::prelude::*;

#[derive(Entity, Debug, Default)]
#[weft(table = "weft_my_user")]
struct MyUser {
    #[weft(tag = "primary;auto_increment")]
    id: OptInt,
    name: OptString,
    score: OptFloat,
}

#[derive(Entity, Debug, Default)]
#[weft(table = "weft_my_score")]
struct MyScore {
    #[weft(tag = "primary;auto_increment")]
    id: OptInt,
    name: OptString,
    score: OptFloat,
}

async fn setup(pool: &MySqlPool, table: &str) -> Catalog {
    let drop_sql = format!("DROP TABLE IF EXISTS {}", table);
    sqlx::query(&drop_sql).execute(pool).await.ok();
    let create_sql = format!(
        "CREATE TABLE {} (id BIGINT AUTO_INCREMENT PRIMARY KEY, name VARCHAR(64), score DOUBLE)",
        table
    );
    sqlx::query(&create_sql).execute(pool).await.expect("create");
    let catalog = Catalog::new();
    catalog.register::<MyUser>().register::<MyScore>();
    catalog
}

#[tokio::test]
async fn mysql_crud_smoke() {
    let pool = match get_mysql_pool().await {
        Some(pool) => pool,
        None => return,
    };
    let catalog = setup(&pool, "weft_my_user").await;

    let id = MyUser::find(&pool, &catalog)
        .insert(&MyUser {
            name: "MyUser".into(),
            score: 100.1.into(),
            ..MyUser::default()
        })
        .await
        .expect("insert");
    assert!(id > 0);

    let found = MyUser::find(&pool, &catalog)
        .where_eq(MyUser::SCORE, 100.1)
        .get_one()
        .await
        .expect("find")
        .expect("row");
    assert_eq!(found.id.get(), Some(&id));

    let updated = MyUser::find(&pool, &catalog)
        .where_eq(MyUser::ID, id)
        .update(&MyUser {
            name: "MyUser2".into(),
            ..MyUser::default()
        })
        .await
        .expect("update");
    assert_eq!(updated, 1);

    let lowered = MyUser::find(&pool, &catalog)
        .where_eq(MyUser::ID, id)
        .decrement(MyUser::SCORE, 0.1)
        .await
        .expect("decrement");
    assert_eq!(lowered, 1);

    let err = MyUser::find(&pool, &catalog).delete().await.unwrap_err();
    assert!(matches!(err, WeftError::UnsafeOperation("delete")));
    let deleted = MyUser::find(&pool, &catalog)
        .where_eq(MyUser::NAME, "MyUser2")
        .delete()
        .await
        .expect("delete");
    assert_eq!(deleted, 1);
}

#[tokio::test]
async fn mysql_filters_and_paging() {
    let pool = match get_mysql_pool().await {
        Some(pool) => pool,
        None => return,
    };
    let catalog = setup(&pool, "weft_my_score").await;

    let rows: Vec<MyScore> = (1..=5)
        .map(|i| MyScore {
            name: format!("user{}", i).into(),
            score: (f64::from(i) * 10.0).into(),
            ..MyScore::default()
        })
        .collect();
    MyScore::find(&pool, &catalog)
        .insert_batch(&rows)
        .await
        .expect("batch");

    let page: Vec<String> = MyScore::find(&pool, &catalog)
        .order_asc(MyScore::ID)
        .page(2, 2)
        .pluck(MyScore::NAME)
        .await
        .expect("page");
    assert_eq!(page, vec!["user3", "user4"]);

    let count = MyScore::find(&pool, &catalog)
        .where_like(MyScore::NAME, ["user", "%"])
        .where_gt(MyScore::ID, 2)
        .count()
        .await
        .expect("count");
    assert_eq!(count, 3);

    let avg = MyScore::find(&pool, &catalog)
        .where_in(MyScore::NAME, ["user1", "user3"])
        .avg::<f64>(MyScore::SCORE)
        .await
        .expect("avg");
    assert_eq!(avg.get(), Some(&20.0));

    assert!(
        MyScore::find(&pool, &catalog)
            .where_eq(MyScore::NAME, "user5")
            .exists()
            .await
            .expect("exists")
    );
}

async fn get_mysql_pool() -> Option<MySqlPool> {
    let db_url = std::env::var("DATABASE_URL").ok()?;
    if !db_url.starts_with("mysql://") {
        return None;
    }
    Some(sqlx::MySqlPool::connect(&db_url).await.ok()?)
}
