use crate::{
    Error, Intake, ItemDetails, ItemStore, SequenceStore, SkuAllocator, backend::MemoryBackend,
};

fn intake<S: SequenceStore, I: ItemStore>(sequences: S, items: I) -> Intake<S, I> {
    Intake::new(SkuAllocator::new(sequences), items)
}

pub(crate) async fn run_resave_keeps_locked_item_number<S, I>(sequences: S, items: I)
where
    S: SequenceStore,
    I: ItemStore,
{
    let intake = intake(sequences, items);

    let first = intake
        .save("item-resave", ItemDetails::new("Louis Vuitton", "Speedy 30"))
        .await
        .unwrap();
    let number = first.item_number.clone().unwrap();
    assert!(first.item_number_locked);
    assert_eq!(number.prefix().to_string(), "LV-SPD");

    let edited = intake
        .save(
            "item-resave",
            ItemDetails::new("Chanel", "Boy Bag").with_title("Relabelled"),
        )
        .await
        .unwrap();
    assert_eq!(edited.item_number, Some(number.clone()));
    assert!(edited.item_number_locked);
    assert_eq!(edited.details.brand, "Chanel");
    assert_eq!(edited.details.title.as_deref(), Some("Relabelled"));

    let stored = intake.get("item-resave").await.unwrap();
    assert_eq!(stored, edited);
}

pub(crate) async fn run_reassign_replaces_item_number<S, I>(sequences: S, items: I)
where
    S: SequenceStore,
    I: ItemStore,
{
    let intake = intake(sequences, items);

    let saved = intake
        .save("item-reassign", ItemDetails::new("Gucci", "Marmont"))
        .await
        .unwrap();
    let original = saved.item_number.unwrap();
    assert_eq!(original.prefix().to_string(), "GC-MRM");

    intake
        .save("item-reassign", ItemDetails::new("Hermes", "Birkin 30"))
        .await
        .unwrap();
    let reassigned = intake.reassign("item-reassign").await.unwrap();
    let replacement = reassigned.item_number.unwrap();

    assert_ne!(replacement, original);
    assert_eq!(replacement.prefix().to_string(), "HR-BRK");
    assert!(reassigned.item_number_locked);
}

pub(crate) async fn run_concurrent_first_saves_lock_once<S, I>(sequences: S, items: I)
where
    S: SequenceStore + Clone + 'static,
    I: ItemStore + Clone + 'static,
{
    let intake = intake(sequences, items);

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let intake = intake.clone();
            tokio::spawn(async move {
                intake
                    .save("item-race", ItemDetails::new("Prada", "Galleria"))
                    .await
            })
        })
        .collect();

    let saved: Vec<_> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    let locked = intake.get("item-race").await.unwrap().item_number.unwrap();
    for item in saved {
        assert_eq!(item.item_number.as_ref(), Some(&locked));
    }
}

#[tokio::test]
async fn first_save_assigns_and_locks() {
    let store = MemoryBackend::new();
    let intake = intake(store.clone(), store);

    let item = intake
        .save("a1", ItemDetails::new("Louis Vuitton", "Neverfull MM"))
        .await
        .unwrap();
    assert_eq!(item.id, "a1");
    assert_eq!(item.item_number.unwrap().to_string(), "LV-NVF-EMZ-001");
    assert!(item.item_number_locked);
}

#[tokio::test]
async fn resave_keeps_locked_item_number() {
    let store = MemoryBackend::new();
    run_resave_keeps_locked_item_number(store.clone(), store).await;
}

#[tokio::test]
async fn resave_does_not_consume_sequence_numbers() {
    let store = MemoryBackend::new();
    let intake = intake(store.clone(), store.clone());

    for _ in 0..3 {
        intake
            .save("a1", ItemDetails::new("Goyard", "Saint Louis"))
            .await
            .unwrap();
    }
    let other = intake
        .save("a2", ItemDetails::new("Goyard", "Saint Louis"))
        .await
        .unwrap();
    assert_eq!(other.item_number.unwrap().sequence(), 2);
}

#[tokio::test]
async fn reassign_replaces_item_number() {
    let store = MemoryBackend::new();
    run_reassign_replaces_item_number(store.clone(), store).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_first_saves_lock_once() {
    let store = MemoryBackend::new();
    run_concurrent_first_saves_lock_once(store.clone(), store).await;
}

#[tokio::test]
async fn blank_fields_are_rejected_without_saving() {
    let store = MemoryBackend::new();
    let intake = intake(store.clone(), store.clone());

    for (id, details) in [
        ("", ItemDetails::new("Dior", "Lady")),
        ("a1", ItemDetails::new(" ", "Lady")),
        ("a1", ItemDetails::new("Dior", "")),
    ] {
        let err = intake.save(id, details).await.unwrap_err();
        assert!(matches!(err, Error::Validation { .. }), "{err}");
    }
    assert!(ItemStore::get(&store, "a1").await.unwrap().is_none());
    assert!(store.counters().await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_items_are_reported() {
    let store = MemoryBackend::new();
    let intake = intake(store.clone(), store);

    let err = intake.get("nope").await.unwrap_err();
    assert_eq!(err, Error::ItemNotFound { id: "nope".into() });
    let err = intake.reassign("nope").await.unwrap_err();
    assert_eq!(err, Error::ItemNotFound { id: "nope".into() });
}
