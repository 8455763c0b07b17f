use metrics::counter;

/// 记录提交成功的持久化任务
pub fn record_job_succeeded() {
    counter!("firewatch_jobs_succeeded_total", 1);
}

/// 记录失败（已回滚）的持久化任务
pub fn record_job_failed() {
    counter!("firewatch_jobs_failed_total", 1);
}
