mod common;

use std::time::Duration;

use buffer::BSIZE;
use common::setup;

#[test]
fn capacity_two_evicts_older_release() {
    let (bc, disk, ticks) = setup(2, 13, Duration::ZERO);
    ticks.tick();
    bc.release(bc.read(0, 1).unwrap());
    ticks.tick();
    bc.release(bc.read(0, 2).unwrap());
    ticks.tick();
    bc.release(bc.read(0, 3).unwrap());
    assert_eq!(disk.reads(), 3);
    assert!(!bc.is_cached(0, 1));

    // block 1 comes back from the device
    let a = bc.read(0, 1).unwrap();
    assert!(a.is_valid());
    assert_eq!(disk.reads(), 4);
    assert!(!bc.is_cached(0, 2));
    assert!(bc.is_cached(0, 3));
}

#[test]
fn full_cache_evicts_smallest_timestamp_in_any_bucket() {
    const K: u32 = 6;
    let (bc, _disk, ticks) = setup(K as usize, 13, Duration::ZERO);
    // block b of device 0 hashes to bucket b
    for b in 0..K {
        ticks.tick();
        bc.release(bc.acquire(0, b));
    }
    // oldest release lands in the last bucket scanned
    let order = [5u32, 0, 4, 1, 3, 2];
    for b in order {
        ticks.tick();
        bc.release(bc.acquire(0, b));
    }
    for (n, evicted) in order.iter().enumerate() {
        ticks.tick();
        bc.release(bc.acquire(0, 100 + n as u32));
        assert!(!bc.is_cached(0, *evicted));
        for still in &order[n + 1..] {
            assert!(bc.is_cached(0, *still));
        }
    }
    bc.check_invariants();
}

#[test]
fn read_returns_last_written_content() {
    let (bc, disk, ticks) = setup(1, 13, Duration::ZERO);
    let mut b = bc.read(1, 10).unwrap();
    b.data_mut().fill(0x5a);
    bc.write(&b).unwrap();
    bc.release(b);

    // push block 10 out, then bring it back
    ticks.tick();
    bc.release(bc.read(1, 11).unwrap());
    assert!(!bc.is_cached(1, 10));
    let b = bc.read(1, 10).unwrap();
    assert!(b.is_valid());
    assert_eq!(b.data(), &[0x5a; BSIZE]);
    assert_eq!(disk.inner.snapshot(1, 10), [0x5a; BSIZE]);
}

#[test]
fn refcount_tracks_outstanding_holds() {
    let (bc, _disk, _ticks) = setup(3, 13, Duration::ZERO);
    let b = bc.acquire(0, 4);
    assert_eq!(bc.refcnt(0, 4), Some(1));
    let first = bc.pin(&b);
    let second = bc.pin(&b);
    assert_eq!(bc.refcnt(0, 4), Some(3));
    assert_eq!(bc.pins(0, 4), Some(2));
    bc.unpin(first);
    assert_eq!(bc.refcnt(0, 4), Some(2));
    bc.release(b);
    assert_eq!(bc.refcnt(0, 4), Some(1));

    // no content lock needed to give the last pin up
    bc.unpin(second);
    assert_eq!(bc.refcnt(0, 4), Some(0));
    assert_eq!(bc.pins(0, 4), Some(0));
    assert_eq!(bc.refcnt(0, 5), None);
}
