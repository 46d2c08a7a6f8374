//! 聚合结果整形
//!
//! 把稀疏的分组计数行对齐到 Bucket Calendar 产出的密集标签序列上：
//! 缺失的桶补零，未命中任何标签的行直接丢弃（不做模糊匹配），
//! 少于两个标签时在头部补一个空桶保证折线可渲染。

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

/// 参与聚合的广告元数据（显示名回退链的输入）
#[derive(Debug, Clone)]
pub struct AdMeta {
    pub user_ad_no: String,
    pub ad_seq: Option<i32>,
    pub ad_name: Option<String>,
}

impl AdMeta {
    /// 显示名回退链：显式名称 -> 序号字符串 -> 复合标识
    pub fn display_name(&self) -> String {
        if let Some(name) = &self.ad_name
            && !name.is_empty()
        {
            return name.clone();
        }
        if let Some(seq) = self.ad_seq {
            return seq.to_string();
        }
        self.user_ad_no.clone()
    }
}

/// 分组计数查询的一行结果
#[derive(Debug, Clone)]
pub struct BucketCountRow {
    pub user_ad_no: String,
    pub bucket_key: String,
    pub count: i64,
}

/// 单个广告的对齐后序列
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdSeries {
    pub user_ad_no: String,
    pub ad_seq: Option<i32>,
    pub name: String,
    pub data: Vec<u64>,
}

/// 聚合结果：x 轴标签 + 每个广告一条等长序列
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketSeries {
    pub labels: Vec<String>,
    pub series: Vec<AdSeries>,
}

impl BucketSeries {
    pub fn empty() -> Self {
        Self {
            labels: Vec::new(),
            series: Vec::new(),
        }
    }
}

/// 把稀疏计数行对齐到密集标签序列
///
/// `prev_label` 是 `end` 所在桶的前一个桶的标签，仅在标签数不足 2 时使用
/// （头部补一个空桶，所有序列同步补 0）。
pub fn align_series(
    mut labels: Vec<String>,
    targets: &[AdMeta],
    rows: Vec<BucketCountRow>,
    prev_label: String,
) -> BucketSeries {
    let index: HashMap<&str, usize> = labels
        .iter()
        .enumerate()
        .map(|(i, label)| (label.as_str(), i))
        .collect();

    let mut data_by_ad: HashMap<&str, Vec<u64>> = targets
        .iter()
        .map(|meta| (meta.user_ad_no.as_str(), vec![0u64; labels.len()]))
        .collect();

    for row in &rows {
        let Some(&pos) = index.get(row.bucket_key.as_str()) else {
            // 时钟偏移或边界错位产生的桶键，静默丢弃
            debug!(
                "Dropping bucket row outside label range: ad={} key={}",
                row.user_ad_no, row.bucket_key
            );
            continue;
        };
        if let Some(data) = data_by_ad.get_mut(row.user_ad_no.as_str()) {
            data[pos] = row.count.max(0) as u64;
        }
    }

    let mut series: Vec<AdSeries> = targets
        .iter()
        .map(|meta| AdSeries {
            user_ad_no: meta.user_ad_no.clone(),
            ad_seq: meta.ad_seq,
            name: meta.display_name(),
            data: data_by_ad
                .remove(meta.user_ad_no.as_str())
                .unwrap_or_default(),
        })
        .collect();

    // 最少两个标签：单桶窗口也要能画出折线
    if labels.len() < 2 {
        labels.insert(0, prev_label);
        for s in &mut series {
            s.data.insert(0, 0);
        }
    }

    BucketSeries { labels, series }
}
