use crate::model::AggregatePoint;
use std::collections::VecDeque;
use tracing::warn;

/// 默认历史长度
pub const HISTORY_LEN: usize = 10;

/// 固定容量的滚动历史
///
/// 严格先进先出：满容量后每次写入淘汰最旧的一项，其余保持写入顺序。
#[derive(Debug, Clone)]
pub struct RollingHistory<T = AggregatePoint> {
    points: VecDeque<T>,
    capacity: usize,
}

impl<T: Clone> RollingHistory<T> {
    /// 创建空的滚动历史，容量为 0 时按 1 处理
    pub fn new(capacity: usize) -> Self {
        let capacity = if capacity == 0 {
            warn!("Rolling history capacity of 0 requested, using 1");
            1
        } else {
            capacity
        };

        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// 创建用同一个点填满的滚动历史（图表初始为全零柱）
    pub fn filled(capacity: usize, point: T) -> Self {
        let mut history = Self::new(capacity);
        for _ in 0..history.capacity {
            history.points.push_back(point.clone());
        }
        history
    }

    /// 追加一个点，超出容量时淘汰最旧的点
    pub fn push(&mut self, point: T) {
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(point);
    }

    /// 按时间顺序复制当前内容
    pub fn snapshot(&self) -> Vec<T> {
        self.points.iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<&T> {
        self.points.back()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }
}

impl<T: Clone> Default for RollingHistory<T> {
    fn default() -> Self {
        Self::new(HISTORY_LEN)
    }
}
