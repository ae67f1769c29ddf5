//! Built-in city lists and route enumeration.

use crate::types::CityPair;

/// Cities inside mainland China served by international flights.
pub const DOMESTIC_CITIES: &[&str] = &[
    "上海", "兰州", "北京", "南京", "南宁", "南昌", "厦门", "呼和浩特", "哈尔滨", "大兴",
    "大连", "天津", "太原", "威海", "宁波", "常州", "广州", "延吉", "德宏", "成都", "无锡",
    "昆明", "杭州", "武汉", "济南", "济州", "深圳", "烟台", "石家庄", "福州", "西双版纳",
    "西安", "郑州", "重庆", "长春", "长沙", "青岛",
];

/// Foreign cities with scheduled service to or from [`DOMESTIC_CITIES`].
pub const INTERNATIONAL_CITIES: &[&str] = &[
    "万象", "东京", "东京成田", "亚的斯亚贝巴", "仰光", "伊斯兰堡", "伊斯坦布尔", "伦敦",
    "内罗毕", "利雅得", "加德满都", "华沙", "卡拉奇", "吉隆坡", "哥本哈根", "塔什干",
    "墨尔本", "墨西哥城", "多伦多", "多哈", "大邱", "大阪", "奥克兰", "巴库", "巴格达",
    "巴黎", "布鲁塞尔", "底特律", "开罗", "德里", "德黑兰", "悉尼", "斯德哥尔摩",
    "斯里巴加湾", "新加坡", "旧金山", "明斯克", "曼德勒", "曼谷", "沉阳", "河内",
    "法兰克福", "洛杉矶", "清莱", "清迈", "温哥华", "特拉维夫", "科伦坡", "科威特", "米兰",
    "约翰内斯堡", "纽约", "维也纳", "美娜多", "胡志明市", "芝加哥", "苏黎世", "莫斯科",
    "西哈努克", "西雅图", "赫尔辛基", "达卡", "达拉斯", "达累斯萨拉姆", "迪拜", "里斯本",
    "金边", "釜山", "阿姆斯特丹", "阿尔及尔", "阿布扎比", "阿拉木图", "雅典", "雅加达",
    "首尔", "马尼拉", "马德里", "马斯喀特", "马斯科特",
];

/// Every route between the two lists, in both directions.
///
/// For each domestic city `d` and each international city `i`, `(d, i)` is
/// followed immediately by `(i, d)`.
pub fn route_pairs<D, I>(domestic: &[D], international: &[I]) -> Vec<CityPair>
where
    D: AsRef<str>,
    I: AsRef<str>,
{
    let mut pairs = Vec::with_capacity(2 * domestic.len() * international.len());

    for d in domestic {
        for i in international {
            let outbound = CityPair::new(d.as_ref(), i.as_ref());
            let inbound = outbound.reversed();
            pairs.push(outbound);
            pairs.push(inbound);
        }
    }

    pairs
}
