//! 审核报告
//!
//! 包装一次审核的结果，附带运行 ID、时间和结果摘要。
//! 摘要只由结果内容决定，相同输入得到相同摘要。

use crate::core::error::ReviewResult;
use crate::core::models::{Finding, PlanSnapshot, Severity};
use crate::core::rule_engine::RuleEngine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewReport {
    pub run_id: String,
    pub generated_at: DateTime<Utc>,
    pub plan_id: String,
    pub findings: Vec<Finding>,
    /// 结果序列的 SHA-256（十六进制）
    pub digest: String,
}

impl ReviewReport {
    /// 执行一次审核并生成报告
    pub fn generate(engine: &RuleEngine, plan: &PlanSnapshot) -> ReviewResult<Self> {
        let findings = engine.review(plan)?;
        Ok(Self::from_findings(plan.plan_id.clone(), findings))
    }

    pub fn from_findings(plan_id: String, findings: Vec<Finding>) -> Self {
        let digest = findings_digest(&findings);
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            generated_at: Utc::now(),
            plan_id,
            findings,
            digest,
        }
    }

    /// 最高严重程度，没有结果时为 None
    pub fn worst_severity(&self) -> Option<Severity> {
        self.findings.iter().map(|f| f.severity).max()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.findings.iter().filter(|f| f.severity == severity).count()
    }
}

/// 按顺序对每条结果的字段做哈希
pub fn findings_digest(findings: &[Finding]) -> String {
    let mut hasher = Sha256::new();
    for finding in findings {
        hasher.update(finding.category.as_bytes());
        hasher.update([0u8]);
        hasher.update(finding.message.as_bytes());
        hasher.update([0u8]);
        hasher.update(finding.severity.to_string().as_bytes());
        hasher.update([u8::from(finding.is_per_item)]);
        hasher.update([0xffu8]);
    }
    hex::encode(hasher.finalize())
}
