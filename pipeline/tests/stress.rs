mod common;
use common::*;

use fibre_pipeline::{Overflow, Pipeline};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

#[test]
fn mpmc_block_stress_counts_stay_bounded() {
  const CAPACITY: usize = 8;
  let num_producers = 8;
  let num_consumers = 4;
  let items_per_producer = ITEMS_HIGH;

  let pipeline = Arc::new(Pipeline::new(CAPACITY).unwrap());
  let received = Arc::new(AtomicUsize::new(0));
  let sum = Arc::new(AtomicUsize::new(0));

  let producers: Vec<_> = (0..num_producers)
    .map(|_| {
      let pipeline = pipeline.clone();
      thread::spawn(move || {
        for i in 1..=items_per_producer {
          pipeline.push(i).unwrap();
          assert!(pipeline.count() <= CAPACITY);
          if i % 10 == 0 {
            thread::yield_now();
          }
        }
      })
    })
    .collect();

  let consumers: Vec<_> = (0..num_consumers)
    .map(|_| {
      let pipeline = pipeline.clone();
      let received = received.clone();
      let sum = sum.clone();
      thread::spawn(move || {
        while let Some(value) = pipeline.pull() {
          assert!(pipeline.count() <= CAPACITY);
          sum.fetch_add(value, Ordering::Relaxed);
          received.fetch_add(1, Ordering::Relaxed);
        }
      })
    })
    .collect();

  for handle in producers {
    handle.join().unwrap();
  }
  pipeline.close().unwrap();
  for handle in consumers {
    handle.join().unwrap();
  }

  let expected_sum = num_producers * (items_per_producer * (items_per_producer + 1) / 2);
  assert_eq!(received.load(Ordering::Relaxed), num_producers * items_per_producer);
  assert_eq!(sum.load(Ordering::Relaxed), expected_sum);
  assert!(pipeline.is_empty());
}

#[test]
fn spsc_fifo_order_preserved() {
  let pipeline = Arc::new(Pipeline::new(4).unwrap());
  let producer = pipeline.clone();
  let handle = thread::spawn(move || {
    for i in 0..ITEMS_HIGH {
      producer.push(i).unwrap();
    }
    producer.close().unwrap();
  });

  let mut expected = 0;
  for value in pipeline.iter() {
    assert_eq!(value, expected);
    expected += 1;
  }
  assert_eq!(expected, ITEMS_HIGH);
  handle.join().unwrap();
}

#[test]
fn per_producer_order_preserved() {
  let pipeline = Arc::new(Pipeline::new(3).unwrap());
  let producers: Vec<_> = (0..4usize)
    .map(|id| {
      let pipeline = pipeline.clone();
      thread::spawn(move || {
        for seq in 0..ITEMS_MEDIUM {
          pipeline.push((id, seq)).unwrap();
        }
      })
    })
    .collect();

  let mut next = [0usize; 4];
  for _ in 0..4 * ITEMS_MEDIUM {
    let (id, seq) = pipeline.pull().unwrap();
    assert_eq!(seq, next[id], "producer {} out of order", id);
    next[id] += 1;
  }
  for handle in producers {
    handle.join().unwrap();
  }
}

#[test]
fn drop_oldest_under_contention_never_blocks() {
  let evicted = Arc::new(AtomicUsize::new(0));
  let counter = evicted.clone();
  let pipeline = Arc::new(
    Pipeline::with_overflow(
      2,
      Overflow::drop_oldest_with(move |_item: usize| {
        counter.fetch_add(1, Ordering::Relaxed);
      }),
    )
    .unwrap(),
  );

  let producers: Vec<_> = (0..4)
    .map(|_| {
      let pipeline = pipeline.clone();
      thread::spawn(move || {
        for i in 0..ITEMS_HIGH {
          pipeline.push(i).unwrap();
        }
      })
    })
    .collect();
  for handle in producers {
    handle.join().unwrap();
  }

  let remaining = pipeline.count();
  assert_eq!(remaining, 2);
  assert_eq!(evicted.load(Ordering::Relaxed) + remaining, 4 * ITEMS_HIGH);
}

#[test]
fn close_races_with_blocked_peers() {
  for _ in 0..ITEMS_LOW / 5 {
    let pipeline = Arc::new(Pipeline::new(1).unwrap());
    let pushed = Arc::new(AtomicUsize::new(0));

    let producers: Vec<_> = (0..4)
      .map(|_| {
        let pipeline = pipeline.clone();
        let pushed = pushed.clone();
        thread::spawn(move || {
          while pipeline.push(1usize).is_ok() {
            pushed.fetch_add(1, Ordering::SeqCst);
          }
        })
      })
      .collect();

    let consumer = {
      let pipeline = pipeline.clone();
      thread::spawn(move || pipeline.iter().count())
    };

    thread::sleep(SHORT_TIMEOUT / 50);
    pipeline.close().unwrap();

    for handle in producers {
      handle.join().unwrap();
    }
    let pulled = consumer.join().unwrap();
    assert_eq!(pulled, pushed.load(Ordering::SeqCst));
  }
}
