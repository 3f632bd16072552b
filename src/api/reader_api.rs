// ==========================================
// 图书馆借阅管理系统 - 读者管理 API
// ==========================================
// 职责: 读者注册、查询、修改、注销
// 红线: 有未归还借阅的读者不得注销
// ==========================================

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::reader::Reader;
use crate::repository::borrowing_repo::BorrowingRepository;
use crate::repository::reader_repo::ReaderRepository;
use crate::validation::validate_reader;

/// 读者信息输入（注册/修改共用）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReaderInput {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub is_staff: bool,
}

fn normalize(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

// ==========================================
// ReaderApi - 读者管理 API
// ==========================================
pub struct ReaderApi {
    reader_repo: Arc<ReaderRepository>,
    borrowing_repo: Arc<BorrowingRepository>,
}

impl ReaderApi {
    pub fn new(reader_repo: Arc<ReaderRepository>, borrowing_repo: Arc<BorrowingRepository>) -> Self {
        Self {
            reader_repo,
            borrowing_repo,
        }
    }

    fn build_reader(reader_id: String, input: ReaderInput, registered_on: NaiveDate) -> Reader {
        Reader {
            reader_id,
            first_name: input.first_name.trim().to_string(),
            last_name: input.last_name.trim().to_string(),
            email: normalize(input.email),
            phone: normalize(input.phone),
            address: normalize(input.address),
            is_staff: input.is_staff,
            registered_on,
        }
    }

    /// 邮箱不得被其他读者占用
    fn ensure_email_free(&self, reader: &Reader) -> ApiResult<()> {
        if let Some(email) = reader.email.as_deref() {
            if let Some(other) = self.reader_repo.find_by_email(email)? {
                if other.reader_id != reader.reader_id {
                    return Err(ApiError::BusinessRuleViolation(format!(
                        "邮箱 {} 已被读者 {} 使用",
                        email, other.reader_id
                    )));
                }
            }
        }
        Ok(())
    }

    /// 注册读者
    ///
    /// # 参数
    /// - input: 读者信息
    /// - today: 注册日期
    pub fn register_reader(&self, input: ReaderInput, today: NaiveDate) -> ApiResult<Reader> {
        let reader = Self::build_reader(Uuid::new_v4().to_string(), input, today);
        validate_reader(&reader)
            .into_result()
            .map_err(ApiError::validation)?;
        self.ensure_email_free(&reader)?;

        self.reader_repo.insert(&reader)?;
        info!(reader_id = %reader.reader_id, is_staff = reader.is_staff, "读者注册成功");
        Ok(reader)
    }

    pub fn get_reader(&self, reader_id: &str) -> ApiResult<Reader> {
        self.reader_repo
            .find_by_id(reader_id)?
            .ok_or_else(|| ApiError::not_found("Reader", reader_id))
    }

    pub fn list_readers(&self) -> ApiResult<Vec<Reader>> {
        Ok(self.reader_repo.list_all()?)
    }

    /// 修改读者信息（注册日期保持不变）
    pub fn update_reader(&self, reader_id: &str, input: ReaderInput) -> ApiResult<Reader> {
        let existing = self.get_reader(reader_id)?;
        let reader = Self::build_reader(existing.reader_id, input, existing.registered_on);
        validate_reader(&reader)
            .into_result()
            .map_err(ApiError::validation)?;
        self.ensure_email_free(&reader)?;

        self.reader_repo.update(&reader)?;
        info!(reader_id = %reader.reader_id, "读者信息已更新");
        Ok(reader)
    }

    /// 注销读者（借阅历史随之删除）
    ///
    /// # 返回
    /// - Err(BusinessRuleViolation): 读者仍有未归还借阅
    pub fn delete_reader(&self, reader_id: &str) -> ApiResult<()> {
        self.get_reader(reader_id)?;

        let active = self.borrowing_repo.count_active_by_reader(reader_id)?;
        if active > 0 {
            warn!(reader_id, active, "拒绝注销: 读者仍有未归还借阅");
            return Err(ApiError::BusinessRuleViolation(format!(
                "读者 {} 仍有 {} 笔未归还借阅，不能注销",
                reader_id, active
            )));
        }

        self.reader_repo.delete(reader_id)?;
        info!(reader_id, "读者已注销");
        Ok(())
    }
}
