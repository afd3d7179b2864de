mod common;

use common::{blog_store, blog_store_with, new_post};
use modeldb::{DbError, StoreConfig, Value, slugify};

#[test]
fn test_duplicate_titles_get_suffixed_tokens() {
    let store = blog_store();
    let mut tokens = Vec::new();
    for _ in 0..3 {
        let mut post = new_post(&store, "Hello World");
        store.insert(&mut post).unwrap();
        tokens.push(post.value("token"));
    }
    assert_eq!(
        tokens,
        [Value::from("hello-world"), Value::from("hello-world-2"), Value::from("hello-world-3")]
    );
}

#[test]
fn test_update_keeps_own_token() {
    let store = blog_store();
    let mut post = new_post(&store, "Stable");
    store.insert(&mut post).unwrap();

    post.set("status", "published").unwrap();
    store.update(&mut post).unwrap();
    assert_eq!(post.value("token"), Value::from("stable"));
}

#[test]
fn test_exhausted_retries() {
    let store = blog_store_with(StoreConfig::new("blog").tokenizer_max_retries(2));
    store.insert(&mut new_post(&store, "Same")).unwrap();
    store.insert(&mut new_post(&store, "Same")).unwrap();

    let mut third = new_post(&store, "Same");
    match store.insert(&mut third) {
        Err(DbError::ExhaustedRetries { entity, field, attempts }) => {
            assert_eq!(entity, "post");
            assert_eq!(field, "token");
            assert_eq!(attempts, 2);
        }
        other => panic!("expected exhausted retries, got {:?}", other),
    }
    assert!(third.is_new());
}

#[test]
fn test_empty_source_uses_default_token() {
    let store = blog_store_with(StoreConfig::new("blog").empty_token_default("untitled"));
    let mut post = new_post(&store, "!!!");
    store.insert(&mut post).unwrap();
    assert_eq!(post.value("token"), Value::from("untitled"));
    assert_eq!(slugify("!!!"), "");
}
