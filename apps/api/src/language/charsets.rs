//! Curated glyph sets for Traditional vs. Simplified Chinese disambiguation,
//! plus the script predicates the detector's composition analysis relies on.
//!
//! The sets focus on characters common in job descriptions (technology, HR and
//! management vocabulary). Both sets share a handful of glyphs that are written
//! identically in either script; only the relative match counts matter.

use std::collections::HashSet;

use lazy_static::lazy_static;

const TRADITIONAL: &str = concat!(
    "繁體語機業資訊軟體開發設計測試資料庫網路計劃團隊責任工作經驗技能專業證照學歷維護系統候選尋找精通熟悉需要具備負責",
    "學習專案管理執行運營營運數據資料分析處理優化協調溝通領導監督製造產品營銷銷售財務會計審計風險合規項目調研開拓擴展",
    "質量品質標準規範流程優勢競爭創新變革轉型數碼數位科技智慧雲端傳統現代先進前沿頂尖卓越績效評估測量指標關鍵重要核心",
    "進階高級初級中級資深首席總監經理主任主管助理實習生全職兼職遠程在線線上離線線下辦公室現場客戶服務支持技術諮詢顧問",
    "軟件硬件網絡安全防護保護隱私機密敏感關聯關係連接整合集成部署運維監控日誌記錄追蹤跟蹤診斷故障排除解決問題回饋反饋",
    "訓練培訓學習成長發展晉升升遷轉職跳槽招聘聘用錄用僱用雇用離職退休請假休假薪資薪酬報酬津貼補助福利保險醫療健康",
    "團隊合作協作配合默契溝通交流互動參與投入貢獻價值創造生產製作建設構建設計開發維護升級更新改進完善優化調整修改",
);

const SIMPLIFIED: &str = concat!(
    "繁体语机业资讯软体开发设计测试资料库网络计划团队责任工作经验技能专业证照学历维护系统候选寻找精通熟悉需要具备负责",
    "学习专案管理执行运营营运数据资料分析处理优化协调沟通领导监督制造产品营销销售财务会计审计风险合规项目调研开拓扩展",
    "质量品质标准规范流程优势竞争创新变革转型数码数位科技智慧云端传统现代先进前沿顶尖卓越绩效评估测量指标关键重要核心",
    "进阶高级初级中级资深首席总监经理主任主管助理实习生全职兼职远程在线线上离线线下办公室现场客户服务支持技术咨询顾问",
    "软件硬件网络安全防护保护隐私机密敏感关联关系连接整合集成部署运维监控日志记录追踪跟踪诊断故障排除解决问题回馈反馈",
    "训练培训学习成长发展晋升升迁转职跳槽招聘聘用录用雇用雇用离职退休请假休假薪资薪酬报酬津贴补助福利保险医疗健康",
    "团队合作协作配合默契沟通交流互动参与投入贡献价值创造生产制作建设构建设计开发维护升级更新改进完善优化调整修改",
);

lazy_static! {
    pub static ref TRADITIONAL_CHARS: HashSet<char> = TRADITIONAL.chars().collect();
    pub static ref SIMPLIFIED_CHARS: HashSet<char> = SIMPLIFIED.chars().collect();
}

/// CJK Unified Ideographs block.
pub fn is_chinese(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}

/// Hiragana or Katakana.
pub fn is_kana(c: char) -> bool {
    ('\u{3040}'..='\u{30ff}').contains(&c)
}

/// Number of distinct glyphs of `text` found in each set: `(traditional, simplified)`.
pub fn variant_matches(text: &str) -> (usize, usize) {
    let distinct: HashSet<char> = text.chars().filter(|c| is_chinese(*c)).collect();
    let traditional = distinct.iter().filter(|c| TRADITIONAL_CHARS.contains(c)).count();
    let simplified = distinct.iter().filter(|c| SIMPLIFIED_CHARS.contains(c)).count();
    (traditional, simplified)
}
