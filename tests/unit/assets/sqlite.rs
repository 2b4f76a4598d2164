use super::*;

#[test]
fn upsert_and_order() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteAssetStore::open(&dir.path().join("assets.db")).unwrap();
    for (url, stamp) in [("https://x/b", 2), ("https://x/a", 1), ("https://x/c", 3)] {
        store.put(&AssetEntry::new(url, "images", stamp)).unwrap();
    }
    let mut a = store.get("https://x/a").unwrap().unwrap();
    a.last_accessed = 10;
    a.loaded = true;
    store.put(&a).unwrap();

    let order: Vec<_> = store
        .oldest(3)
        .unwrap()
        .into_iter()
        .map(|e| e.remote_url)
        .collect();
    assert_eq!(order, ["https://x/b", "https://x/c", "https://x/a"]);
    assert!(store.get("https://x/a").unwrap().unwrap().loaded);
    assert_eq!(store.len().unwrap(), 3);
    assert_eq!(store.clear().unwrap().len(), 3);
    assert_eq!(store.len().unwrap(), 0);
}
