//! Job-level metrics summary (spec §6 job record: `metrics{sync_good,
//! sync_fair, sync_poor, overall_lufs}`).

use serde::{Deserialize, Serialize};

use crate::job::Job;
use crate::providers::media::LoudnessStats;
use crate::segment::SyncQuality;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct JobMetrics {
    pub sync_good: usize,
    pub sync_fair: usize,
    pub sync_poor: usize,
    pub overall_lufs: Option<f32>,
}

impl JobMetrics {
    /// Tally sync-quality counts from the job's segments; `final_loudness`
    /// is the mixed track's measured integrated loudness, if S7 ran.
    pub fn collect(job: &Job, final_loudness: Option<LoudnessStats>) -> Self {
        let mut metrics = JobMetrics::default();
        for seg in &job.segments {
            match seg.sync_quality {
                Some(SyncQuality::Good) => metrics.sync_good += 1,
                Some(SyncQuality::Fair) => metrics.sync_fair += 1,
                Some(SyncQuality::Poor) => metrics.sync_poor += 1,
                None => {}
            }
        }
        metrics.overall_lufs = final_loudness.map(|l| l.integrated_lufs);
        metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JobOptions;
    use crate::segment::Segment;
    use std::path::PathBuf;

    #[test]
    fn tallies_sync_quality_counts() {
        let mut job = Job::new(PathBuf::from("/tmp/src.mp4"), "es", None, JobOptions::default(), &std::env::temp_dir())
            .expect("job creation");
        let mut good = Segment::new(0, 0.0, 1.0, "hi");
        good.sync_quality = Some(SyncQuality::Good);
        let mut fair = Segment::new(1, 1.0, 2.0, "there");
        fair.sync_quality = Some(SyncQuality::Fair);
        let mut poor = Segment::new(2, 2.0, 3.0, "world");
        poor.sync_quality = Some(SyncQuality::Poor);
        job.segments = vec![good, fair, poor];

        let metrics = JobMetrics::collect(&job, None);
        assert_eq!(metrics.sync_good, 1);
        assert_eq!(metrics.sync_fair, 1);
        assert_eq!(metrics.sync_poor, 1);
        assert_eq!(metrics.overall_lufs, None);
    }
}
