use std::path::Path;
use std::thread;

use rand::Rng;

use framepool::error::Result;
use framepool::storage::bufferpool::BufferPoolManager;
use framepool::storage::disk::{DiskManager, FileDiskManager};
use framepool::storage::page::{PageId, PAGE_SIZE};

fn init_logging() {
    let _ = simplelog::SimpleLogger::init(
        simplelog::LevelFilter::Debug,
        simplelog::Config::default(),
    );
}

fn file_bpm(path: &Path, pool_size: usize, replacer_k: usize) -> Result<BufferPoolManager> {
    let disk = Box::new(FileDiskManager::open(path)?);
    Ok(BufferPoolManager::new(disk, pool_size, replacer_k))
}

#[test]
fn test_eviction_write_back_persists() -> Result<()> {
    init_logging();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("pool.db");
    let bpm = file_bpm(&path, 3, 2)?;

    // Scenario: page 0 gets a byte and is unpinned dirty.
    let page0 = bpm.new_page()?;
    page0.write()?.data[0] = 0xab;
    assert!(bpm.unpin_page(0, true)?);

    // Scenario: fill the remaining frames with clean pages.
    bpm.new_page()?;
    bpm.unpin_page(1, false)?;
    bpm.new_page()?;
    bpm.unpin_page(2, false)?;

    // Scenario: the next allocation evicts page 0 (the earliest access of
    // the all-infinite-distance set) and must write it back first.
    bpm.new_page()?;

    // Scenario: fetching page 0 reads the written-back image from the file.
    let page0 = bpm.fetch_page(0)?;
    assert_eq!(0xab, page0.read()?.data[0]);

    Ok(())
}

#[test]
fn test_flush_without_unpin_hits_disk() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("pool.db");
    let bpm = file_bpm(&path, 2, 2)?;

    // Scenario: write a page and flush it while it is still pinned.
    let page0 = bpm.new_page()?;
    page0.write()?.data[..6].copy_from_slice(b"stable");
    assert!(bpm.flush_page(0)?);
    assert_eq!(1, page0.read()?.pin_count);
    assert!(!page0.read()?.is_dirty);

    // Scenario: the page image is on disk, visible to a raw read of the file.
    let mut disk = FileDiskManager::open(&path)?;
    let mut buf = vec![0u8; PAGE_SIZE];
    disk.read_page(0, &mut buf)?;
    assert_eq!(b"stable", &buf[..6]);

    Ok(())
}

#[test]
fn test_flush_all_durable_across_instances() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("pool.db");

    // Scenario: fill a pool with random page images and flush everything.
    let mut images = vec![];
    {
        let bpm = file_bpm(&path, 4, 2)?;
        let mut rng = rand::thread_rng();
        for i in 0..4 {
            let page = bpm.new_page()?;
            let mut image = vec![0u8; PAGE_SIZE];
            rng.fill(&mut image[..]);
            page.write()?.data.copy_from_slice(&image);
            images.push(image);
            bpm.unpin_page(i as PageId, true)?;
        }
        bpm.flush_all_pages()?;
    }

    // Scenario: a fresh, smaller pool over the same file sees every image.
    let bpm = file_bpm(&path, 2, 2)?;
    for (i, image) in images.iter().enumerate() {
        let page = bpm.fetch_page(i as PageId)?;
        assert_eq!(image[..], page.read()?.data[..]);
        bpm.unpin_page(i as PageId, false)?;
    }

    Ok(())
}

#[test]
fn test_concurrent_disjoint_workloads() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("pool.db");
    // pool smaller than the working set, to force eviction churn
    let bpm = file_bpm(&path, 4, 2)?;

    let pages_per_thread: i64 = 8;
    let rounds = 200u64;

    // Scenario: pre-create the pages so both threads only fetch.
    for i in 0..pages_per_thread * 2 {
        bpm.new_page()?;
        bpm.unpin_page(i, false)?;
    }

    // Scenario: two threads hammer disjoint page sets, stamping each page
    // with the round number on every pass.
    let mut handles = vec![];
    for t in 0..2i64 {
        let bpm = bpm.clone();
        handles.push(thread::spawn(move || -> Result<()> {
            let base = t * pages_per_thread;
            for round in 1..=rounds {
                for i in 0..pages_per_thread {
                    let page_id = base + i;
                    let page = bpm.fetch_page(page_id)?;
                    page.write()?.data[..8].copy_from_slice(&round.to_be_bytes());
                    assert!(bpm.unpin_page(page_id, true)?);
                }
            }
            Ok(())
        }));
    }
    for handle in handles {
        handle.join().expect("worker thread panicked")?;
    }

    bpm.flush_all_pages()?;

    // Scenario: the final on-disk state matches a serial interleaving: every
    // page carries its last stamp, ends unpinned and can be deleted.
    for i in 0..pages_per_thread * 2 {
        let page = bpm.fetch_page(i)?;
        assert_eq!(rounds.to_be_bytes()[..], page.read()?.data[..8]);
        bpm.unpin_page(i, false)?;
        assert!(bpm.delete_page(i)?);
    }

    Ok(())
}
