// ==========================================
// 图书馆借阅管理系统 - 学科领域 API
// ==========================================
// 职责: 领域的维护、移动与层级查询
// 红线: 领域层级不得成环
// 红线: 移动领域后，任何图书不得同时属于祖先与后代领域
// ==========================================

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::book_domain::{BookDomain, DomainNode};
use crate::engine::DomainHierarchy;
use crate::repository::book_repo::BookRepository;
use crate::repository::domain_repo::BookDomainRepository;
use crate::validation::validate_domain;

pub struct DomainApi {
    domain_repo: Arc<BookDomainRepository>,
    book_repo: Arc<BookRepository>,
}

impl DomainApi {
    pub fn new(domain_repo: Arc<BookDomainRepository>, book_repo: Arc<BookRepository>) -> Self {
        Self {
            domain_repo,
            book_repo,
        }
    }

    fn load_hierarchy(&self) -> ApiResult<DomainHierarchy> {
        Ok(DomainHierarchy::new(self.domain_repo.list_all()?))
    }

    fn domains_by_ids(hierarchy: &DomainHierarchy, ids: &[String]) -> Vec<BookDomain> {
        ids.iter()
            .filter_map(|id| hierarchy.get(id).cloned())
            .collect()
    }

    /// 新建领域
    ///
    /// # 参数
    /// - parent_id: None 表示根领域
    pub fn create_domain(&self, name: &str, parent_id: Option<&str>) -> ApiResult<BookDomain> {
        let hierarchy = self.load_hierarchy()?;
        let domain = BookDomain {
            domain_id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            parent_id: parent_id.map(|p| p.to_string()),
        };
        validate_domain(&domain, &hierarchy)
            .into_result()
            .map_err(ApiError::validation)?;

        self.domain_repo.insert(&domain)?;
        info!(domain_id = %domain.domain_id, name = %domain.name, "领域已创建");
        Ok(domain)
    }

    pub fn get_domain(&self, domain_id: &str) -> ApiResult<BookDomain> {
        self.domain_repo
            .find_by_id(domain_id)?
            .ok_or_else(|| ApiError::not_found("BookDomain", domain_id))
    }

    pub fn list_domains(&self) -> ApiResult<Vec<BookDomain>> {
        Ok(self.domain_repo.list_all()?)
    }

    pub fn rename_domain(&self, domain_id: &str, new_name: &str) -> ApiResult<BookDomain> {
        let existing = self.get_domain(domain_id)?;
        let hierarchy = self.load_hierarchy()?;
        let domain = BookDomain {
            name: new_name.trim().to_string(),
            ..existing
        };
        validate_domain(&domain, &hierarchy)
            .into_result()
            .map_err(ApiError::validation)?;

        self.domain_repo.update(&domain)?;
        info!(domain_id, name = %domain.name, "领域已改名");
        Ok(domain)
    }

    /// 移动领域到新的父领域下
    ///
    /// # 返回
    /// - Err(DomainHierarchyViolation): 会形成环，或有图书将同时属于祖先与后代领域
    pub fn move_domain(&self, domain_id: &str, new_parent: Option<&str>) -> ApiResult<BookDomain> {
        let existing = self.get_domain(domain_id)?;
        let hierarchy = self.load_hierarchy()?;

        if hierarchy.would_create_cycle(domain_id, new_parent) {
            warn!(domain_id, ?new_parent, "拒绝移动: 会形成环");
            return Err(ApiError::DomainHierarchyViolation(format!(
                "将 {} 移动到 {} 下会形成环",
                domain_id,
                new_parent.unwrap_or("<根>")
            )));
        }

        let domain = BookDomain {
            parent_id: new_parent.map(|p| p.to_string()),
            ..existing
        };
        validate_domain(&domain, &hierarchy)
            .into_result()
            .map_err(ApiError::validation)?;

        // 只有挂在被移动子树上的图书可能产生新的祖先/后代冲突
        let moved = hierarchy.with_reparented(domain_id, new_parent);
        let mut subtree = vec![domain_id.to_string()];
        subtree.extend(hierarchy.descendants(domain_id));
        let conflicting: Vec<String> = self
            .book_repo
            .find_by_domains(&subtree)?
            .into_iter()
            .filter(|b| !moved.find_conflicts(&b.domain_ids).is_empty())
            .map(|b| b.book_id)
            .collect();
        if !conflicting.is_empty() {
            warn!(domain_id, books = conflicting.len(), "拒绝移动: 图书领域冲突");
            return Err(ApiError::DomainHierarchyViolation(format!(
                "移动后以下图书将同时属于祖先与后代领域: {}",
                conflicting.join(", ")
            )));
        }

        self.domain_repo.update(&domain)?;
        info!(domain_id, ?new_parent, "领域已移动");
        Ok(domain)
    }

    /// 删除领域
    ///
    /// # 返回
    /// - Err(DomainHierarchyViolation): 仍有子领域
    /// - Err(BusinessRuleViolation): 仍有图书挂在该领域
    pub fn delete_domain(&self, domain_id: &str) -> ApiResult<()> {
        self.get_domain(domain_id)?;

        let children = self.domain_repo.find_children(Some(domain_id))?;
        if !children.is_empty() {
            warn!(domain_id, children = children.len(), "拒绝删除: 仍有子领域");
            return Err(ApiError::DomainHierarchyViolation(format!(
                "领域 {} 仍有 {} 个子领域，不能删除",
                domain_id,
                children.len()
            )));
        }

        let books = self.book_repo.count_by_domain(domain_id)?;
        if books > 0 {
            warn!(domain_id, books, "拒绝删除: 仍有图书");
            return Err(ApiError::BusinessRuleViolation(format!(
                "领域 {} 下仍有 {} 本图书，不能删除",
                domain_id, books
            )));
        }

        self.domain_repo.delete(domain_id)?;
        info!(domain_id, "领域已删除");
        Ok(())
    }

    /// 祖先领域（最近的在前）
    pub fn ancestors(&self, domain_id: &str) -> ApiResult<Vec<BookDomain>> {
        let hierarchy = self.load_hierarchy()?;
        if !hierarchy.contains(domain_id) {
            return Err(ApiError::not_found("BookDomain", domain_id));
        }
        Ok(Self::domains_by_ids(&hierarchy, &hierarchy.ancestors(domain_id)))
    }

    /// 后代领域（广度优先）
    pub fn descendants(&self, domain_id: &str) -> ApiResult<Vec<BookDomain>> {
        let hierarchy = self.load_hierarchy()?;
        if !hierarchy.contains(domain_id) {
            return Err(ApiError::not_found("BookDomain", domain_id));
        }
        Ok(Self::domains_by_ids(&hierarchy, &hierarchy.descendants(domain_id)))
    }

    pub fn domain_tree(&self) -> ApiResult<Vec<DomainNode>> {
        Ok(self.load_hierarchy()?.build_tree())
    }
}
