use serde::{Deserialize, Serialize};

/// 服务区域，每个区域挂载一套独立的路由
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    China,
    Global,
    Fujian,
}

impl Region {
    pub const ALL: [Region; 3] = [Region::China, Region::Global, Region::Fujian];

    /// 路由前缀
    pub fn route_prefix(&self) -> &'static str {
        match self {
            Region::China => "/cn",
            Region::Global => "/global",
            Region::Fujian => "/fj",
        }
    }

    /// 重定向规则键前缀
    pub fn rule_key(&self) -> &'static str {
        match self {
            Region::China => "china",
            Region::Global => "global",
            Region::Fujian => "fujian",
        }
    }

    pub fn division(&self) -> &'static str {
        match self {
            Region::China | Region::Fujian => "CN",
            Region::Global => "GLOBAL",
        }
    }

    /// 国内区域使用 cn 视图的补丁数据
    pub fn uses_cn_patch(&self) -> bool {
        !matches!(self, Region::Global)
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.rule_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_mapping() {
        assert_eq!(Region::China.route_prefix(), "/cn");
        assert_eq!(Region::Fujian.rule_key(), "fujian");
        assert_eq!(Region::Fujian.division(), "CN");
        assert_eq!(Region::Global.division(), "GLOBAL");
        assert!(!Region::Global.uses_cn_patch());
    }
}
