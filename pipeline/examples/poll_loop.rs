// examples/poll_loop.rs
//
// A single-threaded poll loop consuming from a NotifyPipeline fed by worker
// threads, the way a network service would watch it next to its sockets.

#[cfg(unix)]
fn main() {
  use fibre_pipeline::{NotifyPipeline, Overflow};
  use std::os::fd::AsRawFd;
  use std::sync::Arc;
  use std::thread;
  use std::time::Duration;

  let pipeline = Arc::new(
    NotifyPipeline::with_overflow(
      4,
      Overflow::drop_oldest_with(|job: String| println!("[overflow] dropped {}", job)),
    )
    .expect("failed to create pipeline"),
  );

  let workers: Vec<_> = (0..3)
    .map(|id| {
      let pipeline = pipeline.clone();
      thread::spawn(move || {
        for n in 0..5 {
          let job = format!("worker-{}-job-{}", id, n);
          if pipeline.push(job).is_err() {
            break;
          }
          thread::sleep(Duration::from_millis(5 + id as u64 * 3));
        }
      })
    })
    .collect();

  let mut pfd = libc::pollfd {
    fd: pipeline.as_raw_fd(),
    events: libc::POLLIN,
    revents: 0,
  };

  let mut handled = 0;
  loop {
    let ready = unsafe { libc::poll(&mut pfd, 1, 100) };
    if ready < 0 {
      eprintln!("poll failed: {}", std::io::Error::last_os_error());
      break;
    }
    if ready == 0 {
      if workers.iter().all(|w| w.is_finished()) {
        break;
      }
      continue;
    }
    while let Ok(job) = pipeline.try_pull() {
      println!("[loop] handling {}", job);
      handled += 1;
    }
  }

  for worker in workers {
    worker.join().expect("worker panicked");
  }
  pipeline.close().expect("pipeline already closed");
  println!("handled {} jobs", handled);
}

#[cfg(not(unix))]
fn main() {
  println!("NotifyPipeline requires a unix target");
}
