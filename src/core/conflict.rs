//! 推送冲突处理
//!
//! 解析器本身不做任何终端交互：遇到需要用户判断的情况时返回
//! [`DecisionRequest`]，由调用方取得 [`Decision`] 后再交回解析器。

use crate::core::catalog::{same_category, CatalogEntry, DEFAULT_CATEGORY};
use crate::core::status::BookStatus;
use crate::error::{LibraryError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// 云端候选对象
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCandidate {
    pub remote_id: String,
    pub category: Option<String>,
    pub size: u64,
    pub status: BookStatus,
}

impl RemoteCandidate {
    pub fn from_entry(entry: &CatalogEntry) -> Option<Self> {
        Some(Self {
            remote_id: entry.remote_id.clone()?,
            category: entry.category.clone(),
            size: entry.size,
            status: entry.status,
        })
    }

    /// 截断的 ID，仅用于区分同名对象
    pub fn short_id(&self) -> &str {
        match self.remote_id.char_indices().nth(8) {
            Some((idx, _)) => &self.remote_id[..idx],
            None => &self.remote_id,
        }
    }

    pub fn label(&self) -> String {
        format!(
            "[{}] id {}…",
            self.category.as_deref().unwrap_or(DEFAULT_CATEGORY),
            self.short_id()
        )
    }
}

/// 需要调用方回答的决定请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionRequest {
    /// 云端有多个同名对象
    AmbiguousMatch {
        name: String,
        local_category: Option<String>,
        candidates: Vec<RemoteCandidate>,
    },
    /// 唯一的云端对象分类与本地不同
    CategoryMismatch {
        name: String,
        local_category: Option<String>,
        remote: RemoteCandidate,
    },
}

impl DecisionRequest {
    pub fn name(&self) -> &str {
        match self {
            DecisionRequest::AmbiguousMatch { name, .. } => name,
            DecisionRequest::CategoryMismatch { name, .. } => name,
        }
    }

    /// 该请求允许的全部回答
    pub fn choices(&self) -> Vec<Decision> {
        match self {
            DecisionRequest::AmbiguousMatch { candidates, .. } => (0..candidates.len())
                .map(Decision::Candidate)
                .chain(std::iter::once(Decision::Skip))
                .collect(),
            DecisionRequest::CategoryMismatch { .. } => {
                vec![Decision::UseLocal, Decision::KeepRemote, Decision::Skip]
            }
        }
    }
}

/// 用户的决定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// 选定第 n 个候选作为对应的云端对象
    Candidate(usize),
    /// 把云端对象移到本地分类的目录
    UseLocal,
    /// 云端保持原位
    KeepRemote,
    Skip,
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decision::Candidate(idx) => write!(f, "candidate_{}", idx),
            Decision::UseLocal => write!(f, "use_local"),
            Decision::KeepRemote => write!(f, "keep_remote"),
            Decision::Skip => write!(f, "skip"),
        }
    }
}

/// 单个文件推送最终要执行的动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushAction {
    /// 云端没有对应对象，上传到该分类
    Upload { category: Option<String> },
    /// 已同步，只记录映射
    AlreadySynced {
        remote_id: String,
        category: Option<String>,
        status: BookStatus,
    },
    /// 把云端对象移到本地分类（None 表示根目录），不重新上传
    MoveRemote {
        remote_id: String,
        category: Option<String>,
        status: BookStatus,
    },
    /// 云端保持原位，不做任何本地动作
    KeepRemote {
        remote_id: String,
        category: Option<String>,
        status: BookStatus,
    },
    Skip { reason: String },
}

/// 解析一步的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Act(PushAction),
    Ask(DecisionRequest),
}

/// 回答决定请求的一方（终端提示、测试脚本等）
pub trait DecisionHandler: Send + Sync {
    /// 返回 `Ok(None)` 表示无法作答
    fn decide(&self, request: &DecisionRequest) -> anyhow::Result<Option<Decision>>;
}

/// 无人值守：从不作答
#[derive(Debug, Default, Clone, Copy)]
pub struct Unattended;

impl DecisionHandler for Unattended {
    fn decide(&self, _request: &DecisionRequest) -> anyhow::Result<Option<Decision>> {
        Ok(None)
    }
}

/// 冲突解析器
#[derive(Debug, Default, Clone, Copy)]
pub struct ConflictResolver;

impl ConflictResolver {
    /// 根据云端候选给出第一步
    pub fn plan(name: &str, local_category: Option<&str>, candidates: &[CatalogEntry]) -> Resolution {
        let candidates: Vec<RemoteCandidate> = candidates
            .iter()
            .filter_map(RemoteCandidate::from_entry)
            .collect();

        match candidates.len() {
            0 => Resolution::Act(PushAction::Upload {
                category: local_category.map(String::from),
            }),
            1 => Self::compare(name, local_category, &candidates[0]),
            _ => Resolution::Ask(DecisionRequest::AmbiguousMatch {
                name: name.to_string(),
                local_category: local_category.map(String::from),
                candidates,
            }),
        }
    }

    /// 把决定应用到请求上；选定候选后可能还需要一次分类决定
    pub fn resolve(request: &DecisionRequest, decision: Decision) -> Result<Resolution> {
        match (request, decision) {
            (_, Decision::Skip) => Ok(Resolution::Act(PushAction::Skip {
                reason: "skipped by user".to_string(),
            })),
            (
                DecisionRequest::AmbiguousMatch {
                    name,
                    local_category,
                    candidates,
                },
                Decision::Candidate(idx),
            ) => {
                let chosen = candidates.get(idx).ok_or_else(|| LibraryError::InvalidDecision {
                    name: name.clone(),
                    message: format!("candidate {} out of range ({})", idx, candidates.len()),
                })?;
                Ok(Self::compare(name, local_category.as_deref(), chosen))
            }
            (
                DecisionRequest::CategoryMismatch {
                    local_category,
                    remote,
                    ..
                },
                Decision::UseLocal,
            ) => Ok(Resolution::Act(PushAction::MoveRemote {
                remote_id: remote.remote_id.clone(),
                category: local_category.clone(),
                status: remote.status,
            })),
            (DecisionRequest::CategoryMismatch { remote, .. }, Decision::KeepRemote) => {
                Ok(Resolution::Act(PushAction::KeepRemote {
                    remote_id: remote.remote_id.clone(),
                    category: remote.category.clone(),
                    status: remote.status,
                }))
            }
            (request, decision) => Err(LibraryError::InvalidDecision {
                name: request.name().to_string(),
                message: format!("{} does not answer this request", decision),
            }),
        }
    }

    /// 反复询问直到得到可执行的动作
    pub fn settle(
        name: &str,
        local_category: Option<&str>,
        candidates: &[CatalogEntry],
        handler: &dyn DecisionHandler,
    ) -> Result<PushAction> {
        let mut step = Self::plan(name, local_category, candidates);
        loop {
            let request = match step {
                Resolution::Act(action) => return Ok(action),
                Resolution::Ask(request) => request,
            };

            let decision = handler.decide(&request).map_err(|e| {
                warn!("决定处理失败: {} - {}", name, e);
                LibraryError::Cancelled
            })?;

            step = match (decision, request) {
                (Some(decision), request) => {
                    debug!("冲突决定: {} -> {}", name, decision);
                    Self::resolve(&request, decision)?
                }
                (None, DecisionRequest::AmbiguousMatch { name, candidates, .. }) => {
                    return Err(LibraryError::AmbiguousMatch { name, candidates });
                }
                (None, DecisionRequest::CategoryMismatch { .. }) => {
                    Resolution::Act(PushAction::Skip {
                        reason: "category mismatch left unresolved".to_string(),
                    })
                }
            };
        }
    }

    fn compare(name: &str, local_category: Option<&str>, remote: &RemoteCandidate) -> Resolution {
        if same_category(local_category, remote.category.as_deref()) {
            Resolution::Act(PushAction::AlreadySynced {
                remote_id: remote.remote_id.clone(),
                category: remote.category.clone(),
                status: remote.status,
            })
        } else {
            Resolution::Ask(DecisionRequest::CategoryMismatch {
                name: name.to_string(),
                local_category: local_category.map(String::from),
                remote: remote.clone(),
            })
        }
    }
}
