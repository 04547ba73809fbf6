use std::num::NonZeroU32;

use alloy::primitives::{Address, BlockNumber, U256, address};
use pool_sync_indexer::{
    CheckpointStore, EventRepository, IndexerError, Ingestor, IngestorState, LogSegment,
    MemoryStore, PoolSyncEvent, RawLog, StorageError,
    api::PoolEventItem,
    test_utils::{FailingRepository, ScriptedLogStream, sync_log},
};
use tokio_util::sync::CancellationToken;

const POOL: Address = address!("0x58f876857a02d6762e0101bb5c46a8c1ed44dc16");

fn page(n: u32) -> NonZeroU32 {
    NonZeroU32::new(n).unwrap()
}

/// One log per block in `from..=to`, reserves derived from the block number.
fn segment(from_block: BlockNumber, to_block: BlockNumber) -> LogSegment {
    let logs = (from_block..=to_block)
        .map(|block| sync_log(POOL, block, 0, 0, u128::from(block), u128::from(block) * 2))
        .collect();
    LogSegment::new(from_block, to_block, logs)
}

async fn all_events(store: &MemoryStore) -> anyhow::Result<Vec<PoolSyncEvent>> {
    let mut events = Vec::new();
    for n in 1.. {
        let batch = store.find(page(n)).await?;
        if batch.is_empty() {
            break;
        }
        events.extend(batch);
    }
    Ok(events)
}

async fn run_to_end<S, C, R>(ingestor: &mut Ingestor<S, C, R>) -> anyhow::Result<()>
where
    S: pool_sync_indexer::log_stream::LogStream,
    C: CheckpointStore,
    R: EventRepository,
{
    let result = ingestor.run(CancellationToken::new()).await;
    assert!(matches!(result, Err(IndexerError::LogStreamEnded)), "unexpected {result:?}");
    Ok(())
}

#[tokio::test]
async fn ingests_segments_in_order_and_advances_checkpoint() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    let stream = ScriptedLogStream::new(vec![segment(100, 109), segment(110, 119)]);
    let probe = stream.clone();
    let mut ingestor = Ingestor::new(stream, store.clone(), store.clone(), 100);

    run_to_end(&mut ingestor).await?;

    assert_eq!(probe.requested_blocks(), vec![100, 110, 120]);
    assert_eq!(store.get_current_block_number().await?, Some(119));
    assert_eq!(store.len().await, 20);
    assert_eq!(ingestor.state(), IngestorState::Failed);
    Ok(())
}

#[tokio::test]
async fn replaying_a_segment_does_not_duplicate_events() -> anyhow::Result<()> {
    let events = MemoryStore::new();

    let mut first = Ingestor::new(
        ScriptedLogStream::new(vec![segment(100, 124)]),
        MemoryStore::new(),
        events.clone(),
        100,
    );
    run_to_end(&mut first).await?;
    let stored = all_events(&events).await?;

    // A fresh checkpoint store forces the same range to be ingested again.
    let mut second = Ingestor::new(
        ScriptedLogStream::new(vec![segment(100, 124)]),
        MemoryStore::new(),
        events.clone(),
        100,
    );
    run_to_end(&mut second).await?;

    assert_eq!(events.len().await, 25);
    assert_eq!(all_events(&events).await?, stored);
    Ok(())
}

#[tokio::test]
async fn same_natural_key_in_a_segment_is_stored_once() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    let logs = vec![sync_log(POOL, 7, 1, 3, 10, 10), sync_log(POOL, 7, 1, 3, 20, 20)];
    let stream = ScriptedLogStream::new(vec![LogSegment::new(7, 7, logs)]);
    let mut ingestor = Ingestor::new(stream, store.clone(), store.clone(), 7);

    run_to_end(&mut ingestor).await?;

    let events = all_events(&store).await?;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].reserve0, U256::from(20));
    Ok(())
}

#[tokio::test]
async fn resumes_after_checkpoint() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    store.set_current_block_number(499).await?;
    let stream = ScriptedLogStream::new(vec![segment(500, 509)]);
    let probe = stream.clone();
    let mut ingestor = Ingestor::new(stream, store.clone(), store.clone(), 100);

    run_to_end(&mut ingestor).await?;

    assert_eq!(probe.requested_blocks().first(), Some(&500));
    assert_eq!(store.get_current_block_number().await?, Some(509));
    Ok(())
}

#[tokio::test]
async fn out_of_order_segment_stops_ingestion() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    let stream = ScriptedLogStream::new(vec![segment(100, 109), segment(105, 119)]);
    let mut ingestor = Ingestor::new(stream, store.clone(), store.clone(), 100);

    let result = ingestor.run(CancellationToken::new()).await;

    assert!(matches!(
        result,
        Err(IndexerError::SegmentOutOfOrder { expected: 110, from_block: 105, to_block: 119 })
    ));
    assert_eq!(store.get_current_block_number().await?, Some(109));
    assert_eq!(store.len().await, 10);
    Ok(())
}

#[tokio::test]
async fn failed_sub_batch_keeps_checkpoint_and_replay_completes_the_segment() -> anyhow::Result<()>
{
    // 1100 logs: three sub-batches of at most 512.
    let logs: Vec<RawLog> = (0..1100u64)
        .map(|i| sync_log(POOL, 10 + i / 100, i % 100, 0, u128::from(i) + 1, 1))
        .collect();
    let big_segment = LogSegment::new(10, 20, logs);

    let store = MemoryStore::new();
    store.set_current_block_number(9).await?;
    let failing = FailingRepository::new(store.clone(), 2);
    let mut ingestor = Ingestor::new(
        ScriptedLogStream::new(vec![big_segment.clone()]),
        store.clone(),
        failing.clone(),
        0,
    );

    let result = ingestor.run(CancellationToken::new()).await;

    assert!(matches!(result, Err(IndexerError::Storage(StorageError::Closed))));
    assert_eq!(failing.put_many_calls(), 2);
    assert_eq!(store.len().await, 512);
    assert_eq!(store.get_current_block_number().await?, Some(9));

    let mut restarted =
        Ingestor::new(ScriptedLogStream::new(vec![big_segment]), store.clone(), store.clone(), 0);
    assert_eq!(restarted.start_block().await?, 10);
    run_to_end(&mut restarted).await?;

    assert_eq!(store.len().await, 1100);
    assert_eq!(store.get_current_block_number().await?, Some(20));
    Ok(())
}

#[tokio::test]
async fn stored_event_reads_back_as_hex_item() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    let log = sync_log(POOL, 6_810_708, 4, 12, 1000, 2000);
    let tx_hash = log.transaction_hash.unwrap();
    let stream = ScriptedLogStream::new(vec![LogSegment::new(6_810_708, 6_810_710, vec![log])]);
    let mut ingestor = Ingestor::new(stream, store.clone(), store.clone(), 6_810_708);

    run_to_end(&mut ingestor).await?;

    let events = store.find(page(1)).await?;
    assert_eq!(events.len(), 1);
    let item = PoolEventItem::from(&events[0]);
    assert_eq!(item.address, "0x58f876857a02d6762e0101bb5c46a8c1ed44dc16");
    assert_eq!(item.block_number, "0x67ec54");
    assert_eq!(item.transaction_index, 4);
    assert_eq!(item.log_index, 12);
    assert_eq!(item.transaction_hash, alloy::hex::encode_prefixed(tx_hash));
    assert_eq!(item.reserve0, "0x3e8");
    assert_eq!(item.reserve1, "0x7d0");
    Ok(())
}

#[tokio::test]
async fn pages_hold_ten_events_in_ascending_order() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    // Delivered in reverse order inside the segment.
    let logs = (0..25u64).rev().map(|i| sync_log(POOL, 1_000 + i / 3, i % 3, i, 1, 1)).collect();
    let stream = ScriptedLogStream::new(vec![LogSegment::new(1_000, 1_010, logs)]);
    let mut ingestor = Ingestor::new(stream, store.clone(), store.clone(), 1_000);

    run_to_end(&mut ingestor).await?;

    let sizes = [
        store.find(page(1)).await?.len(),
        store.find(page(2)).await?.len(),
        store.find(page(3)).await?.len(),
        store.find(page(4)).await?.len(),
    ];
    assert_eq!(sizes, [10, 10, 5, 0]);

    // Ascending natural-key order is ascending `i`, so page 2 holds records 11 to 20.
    let second: Vec<u16> = store.find(page(2)).await?.iter().map(|e| e.log_index).collect();
    assert_eq!(second, (10..20).collect::<Vec<u16>>());
    let all = all_events(&store).await?;
    assert_eq!(store.find(page(2)).await?, all[10..20].to_vec());

    let keys: Vec<_> = all.iter().map(PoolSyncEvent::natural_key).collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
    assert_eq!(keys.len(), 25);
    Ok(())
}
