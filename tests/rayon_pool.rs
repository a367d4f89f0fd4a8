use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel;

use jobpool::{PoolError, RayonThreadPool, Result, ThreadPool, WorkerPool};

fn spawn_counter<P: ThreadPool>(pool: &P, jobs: usize) -> Result<Arc<AtomicUsize>> {
    let count = Arc::new(AtomicUsize::new(0));
    for _ in 0..jobs {
        let count = Arc::clone(&count);
        pool.spawn(move || {
            count.fetch_add(1, Ordering::SeqCst);
        })?;
    }
    Ok(count)
}

fn check_barrier<P: ThreadPool>() -> Result<()> {
    let pool = P::new(4)?;
    let count = spawn_counter(&pool, 200)?;
    pool.wait_for_idle()?;
    assert_eq!(count.load(Ordering::SeqCst), 200);
    Ok(())
}

fn check_shutdown_drains<P: ThreadPool>() -> Result<()> {
    let pool = P::new(2)?;
    let count = Arc::new(AtomicUsize::new(0));
    for _ in 0..20 {
        let count = Arc::clone(&count);
        pool.spawn(move || {
            thread::sleep(Duration::from_millis(5));
            count.fetch_add(1, Ordering::SeqCst);
        })?;
    }
    pool.shutdown()?;
    assert_eq!(count.load(Ordering::SeqCst), 20);

    pool.shutdown()?;
    assert!(matches!(pool.spawn(|| {}), Err(PoolError::Closed)));
    Ok(())
}

fn check_panic_isolation<P: ThreadPool>() -> Result<()> {
    let pool = P::new(2)?;
    for _ in 0..4 {
        pool.spawn(|| panic!("expected"))?;
    }
    let count = spawn_counter(&pool, 10)?;
    pool.wait_for_idle()?;
    assert_eq!(count.load(Ordering::SeqCst), 10);
    Ok(())
}

#[test]
fn worker_pool_barrier() -> Result<()> {
    check_barrier::<WorkerPool>()
}

#[test]
fn rayon_pool_barrier() -> Result<()> {
    check_barrier::<RayonThreadPool>()
}

#[test]
fn worker_pool_shutdown_drains() -> Result<()> {
    check_shutdown_drains::<WorkerPool>()
}

#[test]
fn rayon_pool_shutdown_drains() -> Result<()> {
    check_shutdown_drains::<RayonThreadPool>()
}

#[test]
fn worker_pool_panic_isolation() -> Result<()> {
    check_panic_isolation::<WorkerPool>()
}

#[test]
fn rayon_pool_panic_isolation() -> Result<()> {
    check_panic_isolation::<RayonThreadPool>()
}

#[test]
fn rayon_pool_reports_failures() -> Result<()> {
    let pool = RayonThreadPool::new(1)?;
    pool.spawn(|| panic!("rayon job failed"))?;
    pool.wait_for_idle()?;
    let failures = pool.drain_failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].message, "rayon job failed");
    assert_eq!(pool.pending(), 0);
    Ok(())
}

fn check_wait_from_job_during_shutdown<P: ThreadPool + Send + Sync + 'static>() -> Result<()> {
    let pool = Arc::new(P::new(1)?);
    let (job_tx, job_rx) = channel::unbounded();

    let inner = Arc::clone(&pool);
    pool.spawn(move || {
        thread::sleep(Duration::from_millis(100));
        job_tx.send(inner.wait_for_idle()).unwrap();
    })?;

    let (shutdown_tx, shutdown_rx) = channel::unbounded();
    let outer = Arc::clone(&pool);
    thread::spawn(move || shutdown_tx.send(outer.shutdown()).unwrap());

    let shutdown = shutdown_rx
        .recv_timeout(Duration::from_secs(3))
        .expect("shutdown did not return while a job waited on its own pool");
    shutdown?;
    let waited = job_rx.recv_timeout(Duration::from_secs(3)).unwrap();
    assert!(matches!(
        waited,
        Err(PoolError::CalledFromWorker("wait_for_idle"))
    ));
    Ok(())
}

#[test]
fn worker_pool_rejects_wait_from_job_during_shutdown() -> Result<()> {
    check_wait_from_job_during_shutdown::<WorkerPool>()
}

#[test]
fn rayon_pool_rejects_wait_from_job_during_shutdown() -> Result<()> {
    check_wait_from_job_during_shutdown::<RayonThreadPool>()
}

#[test]
fn rayon_pool_rejects_blocking_calls_from_own_job() -> Result<()> {
    let pool = Arc::new(RayonThreadPool::new(2)?);
    let (tx, rx) = channel::unbounded();

    let inner = Arc::clone(&pool);
    pool.spawn(move || {
        tx.send((inner.wait_for_idle(), inner.shutdown())).unwrap();
    })?;

    let (wait, shutdown) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(matches!(wait, Err(PoolError::CalledFromWorker("wait_for_idle"))));
    assert!(matches!(shutdown, Err(PoolError::CalledFromWorker("shutdown"))));

    pool.wait_for_idle()?;
    // A job on a different pool is not mistaken for one of ours.
    let other = RayonThreadPool::new(1)?;
    let (tx, rx) = channel::unbounded();
    let target = Arc::clone(&pool);
    other.spawn(move || tx.send(target.wait_for_idle()).unwrap())?;
    assert!(rx.recv_timeout(Duration::from_secs(5)).unwrap().is_ok());
    other.shutdown()?;
    Ok(())
}

#[test]
fn rayon_pool_shutdown_joins_threads() -> Result<()> {
    let pool = RayonThreadPool::new(3)?;
    assert_eq!(pool.live_threads(), 3);
    spawn_counter(&pool, 30)?;
    pool.shutdown()?;
    assert_eq!(pool.live_threads(), 0);
    Ok(())
}

#[test]
fn rayon_pool_keeps_failures_until_drained() -> Result<()> {
    let pool = RayonThreadPool::new(2)?;
    for i in 0..3 {
        pool.spawn(move || panic!("failure {i}"))?;
    }
    pool.wait_for_idle()?;
    assert_eq!(pool.drain_failures().len(), 3);
    assert!(pool.drain_failures().is_empty());
    Ok(())
}
