//! Scan Engine
//! Runs the check-and-repair phases over one FAT12 image, strictly in order:
//!
//! 1. reachability build, noting what is unreferenced
//! 2. lost-cluster recovery until nothing new can be attached
//! 3. size reconciliation over the final tree
//! 4. a final reachability build as a self-check

use log::{debug, info};

use crate::directory::ROOT_CLUSTER;
use crate::error::Result;
use crate::reachability::{find_unreferenced, mark_reachable, UsedSet};
use crate::reconcile::reconcile_tree;
use crate::recovery::recover_lost;
use crate::report::{Problem, ScanReport};
use crate::volume::Volume;

pub struct ScanEngine<B> {
    volume: Volume<B>,
    used: UsedSet,
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> ScanEngine<B> {
    /// Parse the image's boot sector. Fails before anything is modified.
    pub fn new(image: B) -> Result<Self> {
        let volume = Volume::new(image)?;
        let used = UsedSet::new(volume.geometry().total_clusters);
        debug!("Geometry: {:?}", volume.geometry());
        Ok(ScanEngine { volume, used })
    }

    pub fn volume(&self) -> &Volume<B> {
        &self.volume
    }

    pub fn run(&mut self) -> ScanReport {
        let mut report = ScanReport::new(*self.volume.geometry());

        let initial_problems = mark_reachable(&self.volume, &mut self.used, ROOT_CLUSTER);
        report.initially_unreferenced = find_unreferenced(&self.volume, &self.used);
        info!(
            "{} clusters used, {} unreferenced",
            self.used.used_count(),
            report.initially_unreferenced.len()
        );

        let recovery = recover_lost(&mut self.volume, &mut self.used);
        info!("Recovered {} lost chains", recovery.recovered.len());
        report.lost_files = recovery.recovered;

        let (mismatches, reconcile_problems) = reconcile_tree(&mut self.volume, &mut self.used);
        info!("Reconciled {} file sizes", mismatches.len());
        report.size_mismatches = mismatches;

        let final_problems = mark_reachable(&self.volume, &mut self.used, ROOT_CLUSTER);
        report.unreferenced = find_unreferenced(&self.volume, &self.used);

        for problem in initial_problems
            .into_iter()
            .chain(final_problems)
            .chain(recovery.problems)
            .chain(reconcile_problems)
        {
            push_unique(&mut report.problems, problem);
        }

        report
    }

    pub fn into_image(self) -> B {
        self.volume.into_inner()
    }
}

fn push_unique(problems: &mut Vec<Problem>, problem: Problem) {
    if !problems.contains(&problem) {
        problems.push(problem);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::chain_length;
    use crate::fat::{CLUST_EOF, CLUST_EOFS, CLUST_FREE};
    use crate::report::{LostFile, Repair};
    use crate::test_image::ImageBuilder;

    fn text(report: &ScanReport) -> String {
        let mut out = Vec::new();
        report.write_text(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_clean_image_is_unchanged() {
        let image = ImageBuilder::new()
            .volume_label(b"CLEAN   ")
            .file(0, "a.txt", 2, 700)
            .chain(&[2, 3])
            .subdir(0, "docs", 4)
            .file(4, "b.txt", 5, 10)
            .chain(&[5])
            .build();
        let original = image.clone();
        let mut engine = ScanEngine::new(image).unwrap();
        let report = engine.run();

        assert!(report.is_clean());
        assert_eq!(text(&report), "");
        assert_eq!(engine.into_image(), original);
    }

    #[test]
    fn test_lost_chain_recovered_and_self_check_empty() {
        let image = ImageBuilder::new()
            .file(0, "a.txt", 2, 10)
            .chain(&[2])
            .chain(&[3, 4, 5])
            .build();
        let mut engine = ScanEngine::new(image).unwrap();
        let report = engine.run();

        assert_eq!(report.initially_unreferenced, vec![3, 4, 5]);
        assert!(report.unreferenced.is_empty());
        assert_eq!(
            report.lost_files,
            vec![LostFile {
                start: 3,
                blocks: 3,
                name: "found1.dat".to_string()
            }]
        );
        // The recovered entry's size matches its chain, so nothing to reconcile
        assert!(report.size_mismatches.is_empty());
        assert_eq!(text(&report), "Lost File: 3 3\n");
    }

    #[test]
    fn test_ten_cluster_volume_orphan() {
        let mut image = ImageBuilder::new().chain(&[3, 4, 5]).build();
        // Keep the reserved, FAT and root sectors plus 8 data clusters
        image.truncate(12 * 512);
        let mut engine = ScanEngine::new(image).unwrap();
        assert_eq!(engine.volume().geometry().total_clusters, 10);

        let report = engine.run();
        assert_eq!(report.initially_unreferenced, vec![3, 4, 5]);
        assert!(report.unreferenced.is_empty());
        assert_eq!(text(&report), "Lost File: 3 3\n");

        let offset = engine.volume().geometry().root_dir_offset();
        match engine.volume().slot(offset) {
            crate::dirent::Slot::Live(entry) => {
                assert_eq!(entry.display_name(), "FOUND1.DAT");
                assert_eq!(entry.start_cluster, 3);
                assert_eq!(entry.file_size, 3 * 512);
            }
            other => panic!("expected the recovered entry, got {:?}", other),
        }
    }

    #[test]
    fn test_size_mismatch_repaired_and_reported() {
        let image = ImageBuilder::new()
            .file(0, "name.ext", 3, 100)
            .chain(&[3, 4, 5])
            .build();
        let mut engine = ScanEngine::new(image).unwrap();
        let report = engine.run();

        assert_eq!(text(&report), "NAME.EXT 100 1536\n");
        assert_eq!(report.size_mismatches[0].repair, Repair::Truncated { freed: 2 });
        assert!(report.unreferenced.is_empty());
        assert_eq!(chain_length(engine.volume(), 3).unwrap(), 1);
        assert_eq!(engine.volume().fat_entry(4), CLUST_FREE);
    }

    #[test]
    fn test_corrupt_chain_does_not_stop_run() {
        let image = ImageBuilder::new()
            .file(0, "loop.dat", 5, 1024)
            .fat(5, 6)
            .fat(6, 5)
            .file(0, "name.ext", 10, 100)
            .chain(&[10, 11])
            .chain(&[20])
            .build();
        let mut engine = ScanEngine::new(image).unwrap();
        let report = engine.run();

        assert_eq!(report.lost_files.len(), 1);
        assert_eq!(report.size_mismatches.len(), 1);
        // Reported once even though two phases saw it
        let corrupt: Vec<&Problem> = report
            .problems
            .iter()
            .filter(|p| matches!(p, Problem::CorruptChain { .. }))
            .collect();
        assert_eq!(corrupt.len(), 1);
        assert_eq!(
            text(&report),
            "NAME.EXT 100 1024\nLost File: 20 1\nCorrupt Chain: LOOP.DAT 5 (chain loops back to cluster 5)\n"
        );
    }

    #[test]
    fn test_recovery_converges_on_many_orphans() {
        let mut builder = ImageBuilder::new();
        // Eight two-cluster orphans, tails numbered below heads
        for i in 0..8u16 {
            let head = 40 + i;
            let tail = 10 + i;
            builder = builder.chain(&[head, tail]);
        }
        let mut engine = ScanEngine::new(builder.build()).unwrap();
        let report = engine.run();

        assert_eq!(report.lost_files.len(), 8);
        assert!(report.lost_files.iter().all(|l| l.blocks == 2));
        assert_eq!(report.lost_files[0].start, 40);
        assert_eq!(report.lost_files[7].name, "found8.dat");
        assert!(report.unreferenced.is_empty());
        assert!(report.problems.is_empty());
    }

    #[test]
    fn test_second_run_finds_nothing() {
        let image = ImageBuilder::new()
            .file(0, "name.ext", 3, 100)
            .chain(&[3, 4, 5])
            .chain(&[30, 31])
            .fat(40, CLUST_EOF)
            .build();
        let mut engine = ScanEngine::new(image).unwrap();
        let first = engine.run();
        assert!(!first.is_clean());

        let mut again = ScanEngine::new(engine.into_image()).unwrap();
        let second = again.run();
        assert!(second.is_clean(), "{:?}", second);
    }

    #[test]
    fn test_shared_tail_reported_and_kept() {
        let image = ImageBuilder::new()
            .file(0, "one.txt", 5, 512)
            .file(0, "two.txt", 7, 1024)
            .chain(&[5, 6])
            .chain(&[7, 6])
            .build();
        let mut engine = ScanEngine::new(image).unwrap();
        let report = engine.run();

        assert_eq!(text(&report), "ONE.TXT 512 1024\nCross-linked: 6\n");
        assert_eq!(engine.volume().fat_entry(5), CLUST_EOFS);
        assert_ne!(engine.volume().fat_entry(6), CLUST_FREE);
        assert_eq!(chain_length(engine.volume(), 7).unwrap(), 2);

        let mut again = ScanEngine::new(engine.into_image()).unwrap();
        assert!(again.run().is_clean());
    }
}
