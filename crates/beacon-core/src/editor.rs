//! 返回消息编辑
//!
//! 同一时间最多只有一个编辑会话。再次点击同一设备关闭编辑，点击其他设备
//! 则先关闭当前编辑再打开新的；关闭时草稿与当前值不同才提交。
//! 提交先乐观更新本地记录，再异步发往后端，失败只记录日志，不重试也不回滚。
//! 视图销毁时未提交的草稿直接丢弃。

use crate::context::BoardContext;
use crate::error::{BoardError, Result};
use crate::model::DeviceRecord;
use crate::store::SnapshotStore;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// 编辑状态
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EditState {
    #[default]
    Idle,
    Editing {
        device_index: usize,
        device_name: String,
        draft: String,
    },
}

/// 需要提交到后端的返回消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub device_index: usize,
    pub device_name: String,
    pub message: String,
}

/// 一次切换造成的状态变化
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditTransition {
    Opened {
        device_index: usize,
    },
    Closed {
        device_index: usize,
        committed: bool,
    },
    Switched {
        from: usize,
        to: usize,
        committed: bool,
    },
}

/// 状态机单步结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditStep {
    pub transition: EditTransition,
    pub commit: Option<Commit>,
}

/// 编辑仲裁器（纯状态机，不访问网络）
#[derive(Debug, Default)]
pub struct EditArbiter {
    state: EditState,
}

impl EditArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &EditState {
        &self.state
    }

    pub fn is_editing(&self) -> bool {
        matches!(self.state, EditState::Editing { .. })
    }

    pub fn editing_index(&self) -> Option<usize> {
        match &self.state {
            EditState::Editing { device_index, .. } => Some(*device_index),
            EditState::Idle => None,
        }
    }

    pub fn editing_device(&self) -> Option<&str> {
        match &self.state {
            EditState::Editing { device_name, .. } => Some(device_name),
            EditState::Idle => None,
        }
    }

    pub fn draft(&self) -> Option<&str> {
        match &self.state {
            EditState::Editing { draft, .. } => Some(draft),
            EditState::Idle => None,
        }
    }

    /// 修改草稿
    ///
    /// # 错误
    /// * `Validation` - 当前没有打开的编辑
    pub fn set_draft(&mut self, text: impl Into<String>) -> Result<()> {
        match &mut self.state {
            EditState::Editing { draft, .. } => {
                *draft = text.into();
                Ok(())
            }
            EditState::Idle => Err(BoardError::validation("no edit session is open")),
        }
    }

    /// 点击设备 `index` 的编辑按钮
    ///
    /// 是否为同一设备按名称判断，刷新后顺序变化不会把草稿提交给错误的设备。
    ///
    /// # 错误
    /// * `NotFound` - `index` 超出当前记录范围
    pub fn toggle(&mut self, index: usize, records: &[DeviceRecord]) -> Result<EditStep> {
        let target = records
            .get(index)
            .ok_or_else(|| BoardError::NotFound(format!("device index {}", index)))?;

        match std::mem::take(&mut self.state) {
            EditState::Idle => {
                self.open(index, target);
                Ok(EditStep {
                    transition: EditTransition::Opened {
                        device_index: index,
                    },
                    commit: None,
                })
            }
            EditState::Editing {
                device_index,
                device_name,
                draft,
            } => {
                let commit = commit_if_changed(device_index, device_name.clone(), draft, records);
                let committed = commit.is_some();

                if device_name == target.device_name {
                    return Ok(EditStep {
                        transition: EditTransition::Closed {
                            device_index,
                            committed,
                        },
                        commit,
                    });
                }

                self.open(index, target);
                Ok(EditStep {
                    transition: EditTransition::Switched {
                        from: device_index,
                        to: index,
                        committed,
                    },
                    commit,
                })
            }
        }
    }

    /// 视图销毁：回到空闲，草稿不提交
    pub fn reset(&mut self) -> Option<String> {
        match std::mem::take(&mut self.state) {
            EditState::Editing { draft, .. } => Some(draft),
            EditState::Idle => None,
        }
    }

    fn open(&mut self, index: usize, record: &DeviceRecord) {
        self.state = EditState::Editing {
            device_index: index,
            device_name: record.device_name.clone(),
            draft: record.return_message_or_empty().to_string(),
        };
    }
}

fn commit_if_changed(
    device_index: usize,
    device_name: String,
    draft: String,
    records: &[DeviceRecord],
) -> Option<Commit> {
    // 设备已不在集合中时，以空值为基准比较
    let current = records
        .iter()
        .find(|record| record.device_name == device_name)
        .map(DeviceRecord::return_message_or_empty)
        .unwrap_or("");

    if draft == current {
        return None;
    }

    Some(Commit {
        device_index,
        device_name,
        message: draft,
    })
}

/// 编辑操作的结果
#[derive(Debug)]
pub struct EditOutcome {
    pub transition: EditTransition,
    /// 后台提交任务，调用方可以忽略
    pub submission: Option<JoinHandle<()>>,
}

/// 返回消息编辑器
///
/// 把仲裁器接到存储和后端上：打开编辑时固定该设备的返回消息，
/// 提交时乐观写入存储并在后台发送。
pub struct ReturnMessageEditor {
    store: Arc<SnapshotStore>,
    context: BoardContext,
    arbiter: EditArbiter,
}

impl ReturnMessageEditor {
    pub fn new(store: Arc<SnapshotStore>, context: BoardContext) -> Self {
        Self {
            store,
            context,
            arbiter: EditArbiter::new(),
        }
    }

    pub fn arbiter(&self) -> &EditArbiter {
        &self.arbiter
    }

    pub fn update_draft(&mut self, text: impl Into<String>) -> Result<()> {
        self.arbiter.set_draft(text)
    }

    /// 点击设备 `index` 的编辑按钮，必须在 tokio 运行时内调用
    pub fn toggle(&mut self, index: usize) -> Result<EditOutcome> {
        let records = self.store.records()?;
        let step = self.arbiter.toggle(index, &records)?;

        // 仲裁器已经转移，先同步固定状态，提交失败也不会留下旧设备
        self.store
            .pin_return_message(self.arbiter.editing_device().map(str::to_string));

        let submission = match step.commit {
            Some(commit) => Some(self.commit(commit)?),
            None => None,
        };

        debug!(
            transition = ?step.transition,
            editing = ?self.arbiter.editing_index(),
            "Return message editor toggled"
        );
        Ok(EditOutcome {
            transition: step.transition,
            submission,
        })
    }

    /// 视图销毁，丢弃未提交的草稿
    pub fn teardown(&mut self) {
        if let Some(draft) = self.arbiter.reset() {
            info!(draft_len = draft.len(), "Dropping uncommitted return message draft");
        }
        self.store.pin_return_message(None);
    }

    fn commit(&self, commit: Commit) -> Result<JoinHandle<()>> {
        if !self
            .store
            .apply_return_message(&commit.device_name, &commit.message)?
        {
            warn!(device = %commit.device_name, "Device left the collection before commit");
        }

        let backend = self.context.backend();
        let token = self.context.token();

        Ok(tokio::spawn(async move {
            let Some(token) = token else {
                warn!(device = %commit.device_name, "No bearer token, return message not submitted");
                return;
            };

            match backend
                .submit_return_message(&commit.device_name, &commit.message, &token)
                .await
            {
                Ok(()) => info!(device = %commit.device_name, "Return message submitted"),
                Err(e) => warn!(
                    device = %commit.device_name,
                    error = %e,
                    "Return message submission failed"
                ),
            }
        }))
    }
}

impl Drop for ReturnMessageEditor {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<DeviceRecord> {
        vec![
            DeviceRecord::new("alpha", None).with_return_message("hello"),
            DeviceRecord::new("beta", None),
            DeviceRecord::new("gamma", None).with_return_message("bye"),
        ]
    }

    #[test]
    fn test_open_from_idle() {
        let mut arbiter = EditArbiter::new();
        let step = arbiter.toggle(0, &records()).unwrap();

        assert_eq!(step.transition, EditTransition::Opened { device_index: 0 });
        assert_eq!(step.commit, None);
        assert_eq!(arbiter.draft(), Some("hello"));
        assert_eq!(arbiter.editing_device(), Some("alpha"));
    }

    #[test]
    fn test_close_without_change_does_not_commit() {
        let mut arbiter = EditArbiter::new();
        let records = records();
        arbiter.toggle(1, &records).unwrap();
        assert_eq!(arbiter.draft(), Some(""));

        let step = arbiter.toggle(1, &records).unwrap();
        assert_eq!(
            step.transition,
            EditTransition::Closed {
                device_index: 1,
                committed: false
            }
        );
        assert_eq!(step.commit, None);
        assert_eq!(arbiter.state(), &EditState::Idle);
    }

    #[test]
    fn test_close_with_change_commits() {
        let mut arbiter = EditArbiter::new();
        let records = records();
        arbiter.toggle(0, &records).unwrap();
        arbiter.set_draft("updated").unwrap();

        let step = arbiter.toggle(0, &records).unwrap();
        assert_eq!(
            step.commit,
            Some(Commit {
                device_index: 0,
                device_name: "alpha".to_string(),
                message: "updated".to_string(),
            })
        );
        assert!(!arbiter.is_editing());
    }

    #[test]
    fn test_switch_commits_outgoing_and_opens_incoming() {
        let mut arbiter = EditArbiter::new();
        let records = records();
        arbiter.toggle(0, &records).unwrap();
        arbiter.set_draft("changed").unwrap();

        let step = arbiter.toggle(2, &records).unwrap();
        assert_eq!(
            step.transition,
            EditTransition::Switched {
                from: 0,
                to: 2,
                committed: true
            }
        );
        assert_eq!(step.commit.unwrap().device_name, "alpha");
        assert_eq!(arbiter.editing_index(), Some(2));
        assert_eq!(arbiter.draft(), Some("bye"));
    }

    #[test]
    fn test_open_a_then_b_then_close_commits_at_most_twice() {
        let records = records();
        for (edit_a, edit_b) in [(false, false), (true, false), (false, true), (true, true)] {
            let mut arbiter = EditArbiter::new();
            let mut commits = Vec::new();

            arbiter.toggle(0, &records).unwrap();
            if edit_a {
                arbiter.set_draft("a2").unwrap();
            }
            commits.extend(arbiter.toggle(2, &records).unwrap().commit);
            if edit_b {
                arbiter.set_draft("b2").unwrap();
            }
            commits.extend(arbiter.toggle(2, &records).unwrap().commit);

            let expected = usize::from(edit_a) + usize::from(edit_b);
            assert_eq!(commits.len(), expected);
            for commit in &commits {
                let current = records
                    .iter()
                    .find(|r| r.device_name == commit.device_name)
                    .unwrap()
                    .return_message_or_empty();
                assert_ne!(commit.message, current);
            }
        }
    }

    #[test]
    fn test_reorder_between_clicks_compares_names() {
        let mut arbiter = EditArbiter::new();
        let before = records();
        arbiter.toggle(0, &before).unwrap();
        arbiter.set_draft("moved").unwrap();

        // 刷新后 alpha 不再位于 0 号位置
        let after = vec![before[1].clone(), before[0].clone(), before[2].clone()];
        let step = arbiter.toggle(0, &after).unwrap();

        assert!(matches!(step.transition, EditTransition::Switched { .. }));
        assert_eq!(step.commit.unwrap().device_name, "alpha");
        assert_eq!(arbiter.editing_device(), Some("beta"));
    }

    #[test]
    fn test_reset_drops_draft_and_errors() {
        let mut arbiter = EditArbiter::new();
        assert!(arbiter.set_draft("x").is_err());
        assert!(matches!(
            arbiter.toggle(9, &records()),
            Err(BoardError::NotFound(_))
        ));

        arbiter.toggle(0, &records()).unwrap();
        arbiter.set_draft("pending").unwrap();
        assert_eq!(arbiter.reset(), Some("pending".to_string()));
        assert_eq!(arbiter.state(), &EditState::Idle);
        assert_eq!(arbiter.reset(), None);
    }
}
