//! End-to-end balance scenarios
//!
//! Transfers are submitted to an in-memory ledger and balances are
//! rehydrated from genesis through the event source, the way a host
//! process would after every write.

use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use iou_ledger::{
    accumulate, query, reconstruct, Address, BalanceTable, BlockRange, IouBook,
    MemoryEventSource, TransferEvent,
};

fn accounts() -> (Address, Address, Address) {
    (
        "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266".parse().unwrap(),
        "0x70997970c51812dc3a010c7d01b50e0d17dc79c8".parse().unwrap(),
        "0x3c44cdddb6a900fa2b585dd299e03d12fa4293bc".parse().unwrap(),
    )
}

fn contract() -> Address {
    "0x5fbdb2315678afecb367f032d93f642f64180aa3".parse().unwrap()
}

async fn rehydrate(source: &MemoryEventSource) -> BalanceTable {
    reconstruct(source, &contract(), BlockRange::all())
        .await
        .unwrap()
}

fn random_events(rng: &mut ChaCha8Rng, parties: &[Address], n: usize) -> Vec<TransferEvent> {
    (0..n)
        .map(|_| {
            let i = rng.gen_range(0..parties.len());
            let mut j = rng.gen_range(0..parties.len() - 1);
            if j >= i {
                j += 1;
            }
            TransferEvent::new(parties[i], parties[j])
        })
        .collect()
}

#[tokio::test]
async fn test_initial_balances_are_zero() {
    let (k0, k1, _) = accounts();
    let source = MemoryEventSource::new();
    let table = rehydrate(&source).await;
    assert!(table.is_empty());
    assert_eq!(table.query(&k0, &k1), 0);
    assert_eq!(table.query(&k1, &k0), 0);
}

#[tokio::test]
async fn test_iou_sequence_rehydrated_after_each_transfer() {
    let (k0, k1, k2) = accounts();
    let c = contract();
    let source = MemoryEventSource::new();

    // k0 -> k1 (1/2)
    source.submit_transfer(&c, k0, k1);
    let t = rehydrate(&source).await;
    assert_eq!(t.query(&k0, &k1), 1);
    assert_eq!(t.query(&k1, &k0), -1);

    // k1 -> k2
    source.submit_transfer(&c, k1, k2);
    let t = rehydrate(&source).await;
    assert_eq!(t.query(&k1, &k2), 1);
    assert_eq!(t.query(&k2, &k1), -1);

    // k0 -> k1 (2/2)
    source.submit_transfer(&c, k0, k1);
    let t = rehydrate(&source).await;
    assert_eq!(t.query(&k0, &k1), 2);
    assert_eq!(t.query(&k1, &k0), -2);

    // k1 -> k0 reverses 1/2
    source.submit_transfer(&c, k1, k0);
    let t = rehydrate(&source).await;
    assert_eq!(t.query(&k0, &k1), 1);
    assert_eq!(t.query(&k1, &k0), -1);

    // k1 -> k0 reverses 2/2
    source.submit_transfer(&c, k1, k0);
    let t = rehydrate(&source).await;
    assert_eq!(t.query(&k0, &k1), 0);
    assert_eq!(t.query(&k1, &k0), 0);

    // k2 -> k1 settles the remaining pair
    source.submit_transfer(&c, k2, k1);
    let t = rehydrate(&source).await;
    assert_eq!(t.query(&k1, &k2), 0);
    assert_eq!(t.query(&k2, &k1), 0);
    assert!(t.open_pairs().is_empty());
    assert_eq!(t.event_count(), 6);
}

#[test]
fn test_listed_scenarios() {
    let (k0, k1, k2) = accounts();
    let e = TransferEvent::new;

    let t = accumulate(Vec::new());
    assert_eq!(query(&t, &k0, &k1), 0);

    let t = accumulate(vec![e(k0, k1)]);
    assert_eq!(query(&t, &k0, &k1), 1);
    assert_eq!(query(&t, &k1, &k0), -1);

    let t = accumulate(vec![e(k0, k1), e(k1, k2), e(k0, k1), e(k1, k0), e(k1, k0)]);
    assert_eq!(query(&t, &k0, &k1), 0);
    assert_eq!(query(&t, &k1, &k2), 1);

    let t = accumulate(vec![e(k1, k2), e(k2, k1)]);
    assert_eq!(query(&t, &k1, &k2), 0);
}

#[test]
fn test_cancellation_returns_to_zero() {
    let (k0, k1, _) = accounts();
    for n in 1..=5 {
        let mut events = vec![TransferEvent::new(k0, k1); n];
        let mut table = accumulate(events.clone());
        assert_eq!(table.query(&k0, &k1), n as i64);

        let reverse = vec![TransferEvent::new(k1, k0); n];
        table.apply(reverse.clone());
        assert_eq!(table.query(&k0, &k1), 0);
        assert_eq!(table.query(&k1, &k0), 0);

        events.extend(reverse);
        assert_eq!(accumulate(events), table);
    }
}

#[test]
fn test_permutations_yield_identical_table() {
    let parties: Vec<Address> = (1..=5).map(Address::repeat_byte).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(7);

    for _ in 0..20 {
        let mut events = random_events(&mut rng, &parties, 40);
        let expected = accumulate(events.clone());
        for _ in 0..10 {
            events.shuffle(&mut rng);
            assert_eq!(accumulate(events.clone()), expected);
        }
    }
}

#[test]
fn test_antisymmetry_and_zero_default() {
    let parties: Vec<Address> = (1..=6).map(Address::repeat_byte).collect();
    let outsider = Address::repeat_byte(0xee);
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let table = accumulate(random_events(&mut rng, &parties, 200));

    for a in &parties {
        for b in &parties {
            if a != b {
                assert_eq!(table.query(a, b), -table.query(b, a));
            }
        }
        assert_eq!(table.query(a, &outsider), 0);
        assert_eq!(table.query(&outsider, a), 0);
    }

    let total: i64 = parties.iter().map(|p| table.net_position(p)).sum();
    assert_eq!(total, 0);
}

#[test]
fn test_batches_match_one_shot() {
    let parties: Vec<Address> = (1..=4).map(Address::repeat_byte).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(99);
    let events = random_events(&mut rng, &parties, 60);

    let mut table = BalanceTable::new();
    for chunk in events.chunks(7) {
        table.apply(chunk.to_vec());
    }
    assert_eq!(table, accumulate(events));
}

#[tokio::test]
async fn test_book_tracks_rehydration_block_by_block() {
    let parties: Vec<Address> = (1..=4).map(Address::repeat_byte).collect();
    let c = contract();
    let source = Arc::new(MemoryEventSource::new());
    let mut book = IouBook::new(source.clone(), c, 0);
    let mut rng = ChaCha8Rng::seed_from_u64(3);

    for round in 0..10 {
        let batch: Vec<(Address, Address)> = random_events(&mut rng, &parties, round % 4 + 1)
            .into_iter()
            .map(|e| (e.sender, e.recipient))
            .collect();
        source.submit_block(&c, &batch);
        book.sync().await.unwrap();
        assert_eq!(book.table(), &rehydrate(&source).await);
    }
}
