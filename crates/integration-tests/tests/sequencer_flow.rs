//! Job sequencer: downstream job fires once, after every dependency resolved

mod common;

use common::{aws_connection, report, Harness, NOW};
use describer_core::application::{JobSequencerService, SequencerOutcome};
use describer_core::domain::{
    DependencySource, DescribeJobStatus, DiscoveryType, NewDescribeJob, NewJobSequencer, NextJob,
    SequencerStatus, TriggerType,
};
use describer_core::port::{DescribeJobStore, JobSequencerStore};
use describer_core::SchedulerConfig;

fn sequencer_service(h: &Harness) -> JobSequencerService {
    JobSequencerService::new(
        h.store.clone(),
        h.store.clone(),
        h.store.clone(),
        h.clock.clone(),
        h.config.clone(),
    )
}

async fn table_count(h: &Harness, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(&h.pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_next_job_fires_once_after_last_dependency_fails() {
    let conn = aws_connection("c1");
    let h = Harness::new(SchedulerConfig::default(), vec![conn.clone()]).await;
    let reconciler = h.reconciler();

    let mut ids = Vec::new();
    for resource_type in ["AWS::EC2::Instance", "AWS::S3::Bucket", "AWS::IAM::Role"] {
        let new = NewDescribeJob::new(
            &conn,
            resource_type,
            DiscoveryType::Full,
            TriggerType::Manual,
        );
        ids.push(h.store.create_job(&new, NOW).await.unwrap().unwrap().id);
    }
    for id in &ids {
        assert!(h.store.mark_queued(*id, NOW).await.unwrap());
    }

    let sequencer = h
        .store
        .create_sequencer(
            &NewJobSequencer {
                dependency_list: ids.clone(),
                dependency_source: DependencySource::Describe,
                next_job: NextJob::Analytics,
            },
            NOW,
        )
        .await
        .unwrap();

    reconciler
        .apply(&report(ids[0], DescribeJobStatus::Succeeded))
        .await
        .unwrap();
    reconciler
        .apply(&report(ids[1], DescribeJobStatus::InProgress))
        .await
        .unwrap();
    reconciler
        .apply(&report(ids[2], DescribeJobStatus::Succeeded))
        .await
        .unwrap();

    let service = sequencer_service(&h);
    let pass = service.run_once().await.unwrap();
    assert_eq!(pass.waiting, 1);
    assert_eq!(pass.finished, 0);
    let waiting = h.store.get_sequencer(sequencer.id).await.unwrap().unwrap();
    assert_eq!(waiting.status, SequencerStatus::WaitingForDependencies);
    assert_eq!(table_count(&h, "analytics_jobs").await, 0);

    let mut failed = report(ids[1], DescribeJobStatus::Failed);
    failed.error = Some("throttled".to_string());
    reconciler.apply(&failed).await.unwrap();

    let pass = service.run_once().await.unwrap();
    assert_eq!(pass.finished, 1);
    let finished = h.store.get_sequencer(sequencer.id).await.unwrap().unwrap();
    assert_eq!(finished.status, SequencerStatus::Finished);
    assert_eq!(table_count(&h, "analytics_jobs").await, 1);

    // Later passes and stale copies of the record never fire it again
    let pass = service.run_once().await.unwrap();
    assert_eq!(pass.finished, 0);
    assert_eq!(
        service.process(&waiting).await.unwrap(),
        SequencerOutcome::AlreadyHandled
    );
    assert_eq!(table_count(&h, "analytics_jobs").await, 1);
}

#[tokio::test]
async fn test_manual_trigger_with_next_job_creates_benchmark_job() {
    let h = Harness::new(SchedulerConfig::default(), vec![aws_connection("c1")]).await;
    let reconciler = h.reconciler();

    let triggered = h
        .scheduling()
        .trigger_manual(
            "c1",
            &["AWS::EC2::Instance".to_string(), "AWS::S3::Bucket".to_string()],
            false,
            Some(NextJob::Benchmark {
                benchmark_id: "cis-aws".to_string(),
            }),
        )
        .await
        .unwrap();
    assert_eq!(triggered.job_ids.len(), 2);
    let sequencer_id = triggered.sequencer_id.unwrap();

    let service = sequencer_service(&h);
    assert_eq!(service.run_once().await.unwrap().waiting, 1);

    for id in &triggered.job_ids {
        reconciler
            .apply(&report(*id, DescribeJobStatus::Succeeded))
            .await
            .unwrap();
    }
    assert_eq!(service.run_once().await.unwrap().finished, 1);

    let sequencer = h.store.get_sequencer(sequencer_id).await.unwrap().unwrap();
    assert_eq!(sequencer.status, SequencerStatus::Finished);
    assert_eq!(sequencer.dependency_list, triggered.job_ids);
    assert_eq!(table_count(&h, "benchmark_jobs").await, 1);
}
