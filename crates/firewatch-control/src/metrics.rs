use metrics::counter;

/// 记录已发布的执行器指令
pub fn record_command_dispatched() {
    counter!("firewatch_commands_dispatched_total", 1);
}
