use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

/// 消息标识
///
/// 由主题与载荷字节的 SHA-256 摘要构成。传输层在重连或重试后重投的
/// 消息字节不变，因此得到相同标识。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageIdentity(String);

impl MessageIdentity {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// 从入站消息派生标识
    pub fn from_message(topic: &str, payload: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(topic.as_bytes());
        hasher.update([0u8]);
        hasher.update(payload);
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 去重窗口配置
#[derive(Debug, Clone)]
pub struct DedupConfig {
    /// 标识保留时长
    pub retention: Duration,
    /// 最多记录的标识数，超出时淘汰最旧的
    pub max_entries: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            retention: Duration::from_secs(600),
            max_entries: 100_000,
        }
    }
}

/// 去重闸门
///
/// 进程内唯一持有已见标识集合的组件。临界区只做过期淘汰、成员检查和插入，
/// 不做任何 I/O；载荷解析在锁外完成。
pub struct DedupGate {
    config: DedupConfig,
    state: Mutex<DedupState>,
}

#[derive(Default)]
struct DedupState {
    seen: HashMap<MessageIdentity, Instant>,
    /// 按插入时间排序，用于淘汰
    order: VecDeque<(Instant, MessageIdentity)>,
}

impl DedupState {
    fn evict_expired(&mut self, now: Instant, retention: Duration) {
        while let Some((inserted_at, _)) = self.order.front() {
            if now.saturating_duration_since(*inserted_at) < retention {
                break;
            }
            if let Some((_, identity)) = self.order.pop_front() {
                self.seen.remove(&identity);
            }
        }
    }

    fn evict_oldest(&mut self) {
        if let Some((_, identity)) = self.order.pop_front() {
            self.seen.remove(&identity);
        }
    }
}

impl DedupGate {
    pub fn new(config: DedupConfig) -> Self {
        Self {
            config,
            state: Mutex::new(DedupState::default()),
        }
    }

    /// 首次见到返回 `true` 并记录；保留窗口内重复出现返回 `false`
    pub fn admit(&self, identity: &MessageIdentity) -> bool {
        self.admit_at(identity, Instant::now())
    }

    fn admit_at(&self, identity: &MessageIdentity, now: Instant) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        state.evict_expired(now, self.config.retention);

        if state.seen.contains_key(identity) {
            return false;
        }

        if self.config.max_entries > 0 && state.seen.len() >= self.config.max_entries {
            state.evict_oldest();
        }

        state.seen.insert(identity.clone(), now);
        state.order.push_back((now, identity.clone()));
        true
    }

    /// 当前记录的标识数
    pub fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .seen
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 主动清理过期标识
    pub fn purge_expired(&self) -> usize {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let before = state.seen.len();
        state.evict_expired(Instant::now(), self.config.retention);
        let removed = before - state.seen.len();
        drop(state);

        if removed > 0 {
            debug!(removed = removed, "Purged expired message identities");
        }
        removed
    }
}

impl Default for DedupGate {
    fn default() -> Self {
        Self::new(DedupConfig::default())
    }
}
