// ==========================================
// 图书馆借阅管理系统 - 学科领域层级引擎
// ==========================================
// 红线: 同一本书不得同时属于某领域及其后代领域
// 红线: 领域层级不得成环
// ==========================================
// 职责: 祖先/后代查询、成环检测、图书领域集合冲突检测
// 输入: 全量 BookDomain 列表（内存对象图）
// 输出: 纯计算结果，不读写数据库
// ==========================================

use crate::domain::book_domain::{BookDomain, DomainNode};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

// ==========================================
// DomainHierarchy - 领域层级
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct DomainHierarchy {
    domains: HashMap<String, BookDomain>,
    children: HashMap<String, Vec<String>>, // parent_id → 子领域（按名称排序）
    roots: Vec<String>,                     // 无父领域或父领域缺失
}

impl DomainHierarchy {
    /// 由全量领域列表构建层级
    pub fn new(domains: Vec<BookDomain>) -> Self {
        let mut by_id: HashMap<String, BookDomain> = HashMap::with_capacity(domains.len());
        for d in domains {
            by_id.insert(d.domain_id.clone(), d);
        }

        let mut children: HashMap<String, Vec<String>> = HashMap::new();
        let mut roots = Vec::new();
        for d in by_id.values() {
            match d.parent_id.as_deref() {
                Some(pid) if by_id.contains_key(pid) => {
                    children
                        .entry(pid.to_string())
                        .or_default()
                        .push(d.domain_id.clone());
                }
                _ => roots.push(d.domain_id.clone()),
            }
        }

        let sort_key = |id: &String| {
            by_id
                .get(id)
                .map(|d| (d.name.to_lowercase(), d.domain_id.clone()))
                .unwrap_or_default()
        };
        roots.sort_by_key(sort_key);
        for list in children.values_mut() {
            list.sort_by_key(sort_key);
        }

        Self {
            domains: by_id,
            children,
            roots,
        }
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    pub fn contains(&self, domain_id: &str) -> bool {
        self.domains.contains_key(domain_id)
    }

    pub fn get(&self, domain_id: &str) -> Option<&BookDomain> {
        self.domains.get(domain_id)
    }

    fn parent_of(&self, domain_id: &str) -> Option<&str> {
        self.domains
            .get(domain_id)
            .and_then(|d| d.parent_id.as_deref())
            .filter(|pid| self.domains.contains_key(*pid))
    }

    /// 祖先链（最近的父领域在前）
    ///
    /// 存量数据若已成环，遇到已访问节点即停止
    pub fn ancestors(&self, domain_id: &str) -> Vec<String> {
        let mut result = Vec::new();
        let mut visited: HashSet<&str> = HashSet::new();
        visited.insert(domain_id);

        let mut current = self.parent_of(domain_id);
        while let Some(pid) = current {
            if !visited.insert(pid) {
                tracing::warn!(domain_id, cycle_at = pid, "领域层级存在环，祖先遍历提前终止");
                break;
            }
            result.push(pid.to_string());
            current = self.parent_of(pid);
        }
        result
    }

    /// 全部后代（广度优先，不含自身）
    pub fn descendants(&self, domain_id: &str) -> Vec<String> {
        let mut result = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(domain_id.to_string());

        let mut queue: VecDeque<&str> = VecDeque::new();
        queue.push_back(domain_id);
        while let Some(id) = queue.pop_front() {
            if let Some(kids) = self.children.get(id) {
                for kid in kids {
                    if visited.insert(kid.clone()) {
                        result.push(kid.clone());
                        queue.push_back(kid.as_str());
                    }
                }
            }
        }
        result
    }

    /// ancestor 是否为 descendant 的（严格）祖先
    pub fn is_ancestor(&self, ancestor: &str, descendant: &str) -> bool {
        if ancestor == descendant {
            return false;
        }
        self.ancestors(descendant).iter().any(|a| a == ancestor)
    }

    pub fn roots(&self) -> Vec<&BookDomain> {
        self.roots.iter().filter_map(|id| self.domains.get(id)).collect()
    }

    pub fn children(&self, domain_id: &str) -> Vec<&BookDomain> {
        self.children
            .get(domain_id)
            .map(|ids| ids.iter().filter_map(|id| self.domains.get(id)).collect())
            .unwrap_or_default()
    }

    /// 层级深度（根领域为 0）
    pub fn depth(&self, domain_id: &str) -> usize {
        self.ancestors(domain_id).len()
    }

    /// 将 domain_id 挂到 new_parent 下是否会成环
    pub fn would_create_cycle(&self, domain_id: &str, new_parent: Option<&str>) -> bool {
        match new_parent {
            None => false,
            Some(p) if p == domain_id => true,
            Some(p) => self.descendants(domain_id).iter().any(|d| d == p),
        }
    }

    /// 检测领域集合中的祖先/后代冲突
    ///
    /// # 返回
    /// - Vec<(祖先, 后代)>，按输入顺序；无冲突时为空
    pub fn find_conflicts(&self, domain_ids: &[String]) -> Vec<(String, String)> {
        let mut conflicts = Vec::new();
        for (i, a) in domain_ids.iter().enumerate() {
            for b in domain_ids.iter().skip(i + 1) {
                if self.is_ancestor(a, b) {
                    conflicts.push((a.clone(), b.clone()));
                } else if self.is_ancestor(b, a) {
                    conflicts.push((b.clone(), a.clone()));
                }
            }
        }
        conflicts
    }

    /// 领域集合连同全部祖先（去重）
    pub fn expand_with_ancestors(&self, domain_ids: &[String]) -> BTreeSet<String> {
        let mut set = BTreeSet::new();
        for id in domain_ids {
            set.insert(id.clone());
            set.extend(self.ancestors(id));
        }
        set
    }

    /// 模拟移动领域后的层级（用于移动前的冲突预检）
    pub fn with_reparented(&self, domain_id: &str, new_parent: Option<&str>) -> DomainHierarchy {
        let domains = self
            .domains
            .values()
            .map(|d| {
                if d.domain_id == domain_id {
                    BookDomain {
                        parent_id: new_parent.map(|p| p.to_string()),
                        ..d.clone()
                    }
                } else {
                    d.clone()
                }
            })
            .collect();
        DomainHierarchy::new(domains)
    }

    /// 构建领域树（从根领域出发；成环部分不可达，不会出现在树中）
    pub fn build_tree(&self) -> Vec<DomainNode> {
        let mut visited = HashSet::new();
        self.roots
            .iter()
            .filter_map(|id| self.build_node(id, &mut visited))
            .collect()
    }

    fn build_node(&self, domain_id: &str, visited: &mut HashSet<String>) -> Option<DomainNode> {
        if !visited.insert(domain_id.to_string()) {
            return None;
        }
        let domain = self.domains.get(domain_id)?.clone();
        let children = self
            .children
            .get(domain_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.build_node(id, visited))
                    .collect()
            })
            .unwrap_or_default();
        Some(DomainNode { domain, children })
    }
}
