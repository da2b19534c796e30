//! 解析层交付的类型化记录
//!
//! 文件解析（结构体反射、块头、指针解析）不在本 crate 内。解析层把需要的字段
//! 读成下面的记录，并把按旧内存地址引用的数据放进 [`LoadedFeatureIndex`]。
//! 新旧两种数据格式由 [`SchemaVersion`] 在加载开始时选定一次。

use std::collections::HashMap;

use super::{Action, BezierControlPoint, BezierCurve, ChannelDescriptor, ChannelKind, CurveSet};
use crate::config::AnimationConfig;
use crate::{AnimError, Result};

/// 源文件中的旧内存地址
pub type Address = u64;

/// 源数据格式版本
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchemaVersion {
    /// 2.50 之前：动作通道引用 IPO，曲线以 adrcode 标识
    Legacy,
    /// 2.50 及之后：动作分组 + 以路径标识的 F-Curve
    Modern,
}

impl SchemaVersion {
    /// 由文件头中的版本号（例如 249、279）确定
    pub fn from_file_version(version: u32) -> Self {
        if version < 250 {
            SchemaVersion::Legacy
        } else {
            SchemaVersion::Modern
        }
    }
}

/// 贝塞尔三元组（入手柄、锚点、出手柄）
#[derive(Clone, Debug, PartialEq)]
pub struct BezTripleRecord {
    pub vec: [[f32; 3]; 3],
    pub radius: f32,
}

impl BezTripleRecord {
    pub fn new(vec: [[f32; 3]; 3]) -> Self {
        Self { vec, radius: 1.0 }
    }

    /// 手柄与锚点重合的关键帧
    pub fn key(frame: f32, value: f32) -> Self {
        let p = [frame, value, 0.0];
        Self::new([p, p, p])
    }

    fn to_control_point(&self) -> BezierControlPoint {
        BezierControlPoint::from_triple(&self.vec, self.radius)
    }
}

/// 新版 F-Curve
#[derive(Clone, Debug, PartialEq)]
pub struct FCurveRecord {
    pub rna_path: String,
    pub array_index: i32,
    pub bezt: Vec<BezTripleRecord>,
}

/// 新版动作分组（一个特征的全部通道）
#[derive(Clone, Debug, PartialEq)]
pub struct ActionGroupRecord {
    pub name: String,
    pub channels: Vec<FCurveRecord>,
}

/// 旧版 IPO 曲线
#[derive(Clone, Debug, PartialEq)]
pub struct IpoCurveRecord {
    pub adrcode: i32,
    pub bezt: Vec<BezTripleRecord>,
}

/// 旧版 IPO 块
#[derive(Clone, Debug, PartialEq)]
pub struct IpoRecord {
    pub address: Address,
    pub curves: Vec<IpoCurveRecord>,
}

/// 旧版动作通道
#[derive(Clone, Debug, PartialEq)]
pub struct ActionChannelRecord {
    pub name: String,
    pub ipo: Option<Address>,
}

/// 动作块
///
/// 解析层只填写与文件版本对应的列表：新版填 `groups`，旧版填 `channels`。
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ActionRecord {
    pub name: String,
    pub groups: Vec<ActionGroupRecord>,
    pub channels: Vec<ActionChannelRecord>,
}

/// 骨骼块
#[derive(Clone, Debug, PartialEq)]
pub struct BoneRecord {
    pub name: String,
    pub address: Address,
    /// 骨架空间矩阵，按列存储
    pub arm_mat: [[f32; 4]; 4],
    pub length: f32,
    pub flag: i32,
    pub children: Vec<BoneRecord>,
}

impl BoneRecord {
    pub fn new(name: impl Into<String>, address: Address, arm_mat: [[f32; 4]; 4]) -> Self {
        Self {
            name: name.into(),
            address,
            arm_mat,
            length: 1.0,
            flag: 0,
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: BoneRecord) -> Self {
        self.children.push(child);
        self
    }
}

/// 姿态通道
#[derive(Clone, Debug, PartialEq)]
pub struct PoseChannelRecord {
    pub loc: [f32; 3],
    /// (w, x, y, z)
    pub quat: [f32; 4],
    pub size: [f32; 3],
    pub ik_stretch: f32,
    pub limit_min: [f32; 3],
    pub limit_max: [f32; 3],
    pub stiffness: [f32; 3],
    pub ik_flag: i32,
}

impl Default for PoseChannelRecord {
    fn default() -> Self {
        Self {
            loc: [0.0; 3],
            quat: [1.0, 0.0, 0.0, 0.0],
            size: [1.0; 3],
            ik_stretch: 0.0,
            limit_min: [0.0; 3],
            limit_max: [0.0; 3],
            stiffness: [0.0; 3],
            ik_flag: 0,
        }
    }
}

/// 一次加载会话中按地址索引的已加载数据
///
/// 加载开始时构建一次，之后只读，显式传给各个构建器。
#[derive(Clone, Debug, Default)]
pub struct LoadedFeatureIndex {
    ipos: HashMap<Address, IpoRecord>,
    pose_channels: HashMap<Address, PoseChannelRecord>,
}

impl LoadedFeatureIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ipo(mut self, ipo: IpoRecord) -> Self {
        self.ipos.insert(ipo.address, ipo);
        self
    }

    /// 按所属骨骼地址登记姿态通道
    pub fn with_pose_channel(mut self, bone: Address, channel: PoseChannelRecord) -> Self {
        self.pose_channels.insert(bone, channel);
        self
    }

    pub fn ipo(&self, address: Address) -> Option<&IpoRecord> {
        self.ipos.get(&address)
    }

    pub fn pose_channel(&self, bone: Address) -> Option<&PoseChannelRecord> {
        self.pose_channels.get(&bone)
    }
}

/// 旧版旋转曲线以 10 度为单位
const LEGACY_ROTATION_FACTOR: f32 = 10.0 * std::f32::consts::PI / 180.0;

/// 动作加载器
pub struct ActionLoader<'a> {
    config: &'a AnimationConfig,
    index: &'a LoadedFeatureIndex,
    schema: SchemaVersion,
    build: fn(&ActionLoader<'a>, &ActionRecord) -> Action,
}

impl<'a> ActionLoader<'a> {
    pub fn new(
        schema: SchemaVersion,
        config: &'a AnimationConfig,
        index: &'a LoadedFeatureIndex,
    ) -> Self {
        let build: fn(&Self, &ActionRecord) -> Action = match schema {
            SchemaVersion::Legacy => Self::build_legacy,
            SchemaVersion::Modern => Self::build_modern,
        };
        Self {
            config,
            index,
            schema,
            build,
        }
    }

    pub fn schema(&self) -> SchemaVersion {
        self.schema
    }

    /// 加载单个动作
    pub fn load(&self, record: &ActionRecord) -> Action {
        log::info!("加载动作: {}", record.name);
        (self.build)(self, record)
    }

    /// 加载全部动作
    pub fn load_all<'r>(&self, records: impl IntoIterator<Item = &'r ActionRecord>) -> Vec<Action> {
        records.into_iter().map(|r| self.load(r)).collect()
    }

    /// 新版：每个分组是一个特征，分组内的通道按路径识别
    fn build_modern(&self, record: &ActionRecord) -> Action {
        let mut action = Action::new(record.name.clone(), self.config.fps);
        for group in &record.groups {
            match Self::group_curves(group) {
                Ok(curves) => {
                    action.insert_feature(group.name.clone(), CurveSet::from_curves(curves))
                }
                Err(e) => log::warn!("跳过特征 {} ({}): {}", group.name, record.name, e),
            }
        }
        action
    }

    fn group_curves(group: &ActionGroupRecord) -> Result<Vec<BezierCurve>> {
        let mut curves = Vec::with_capacity(group.channels.len());
        for channel in &group.channels {
            let descriptor = ChannelDescriptor::new(channel.rna_path.clone(), channel.array_index);
            let kind = match descriptor.classify() {
                Ok(kind) => kind,
                Err(e) => {
                    log::warn!("{}: {}", group.name, e);
                    continue;
                }
            };
            curves.push(build_curve(kind, &channel.bezt)?);
        }
        Ok(curves)
    }

    /// 旧版：每个动作通道通过地址引用一个 IPO 块
    fn build_legacy(&self, record: &ActionRecord) -> Action {
        let mut action = Action::new(record.name.clone(), self.config.fps);
        for channel in &record.channels {
            let Some(address) = channel.ipo else {
                continue;
            };
            let Some(ipo) = self.index.ipo(address) else {
                log::warn!(
                    "{}",
                    AnimError::FeatureNotFound(format!("ipo {:#x} of {}", address, channel.name))
                );
                continue;
            };
            if ipo.curves.is_empty() {
                log::debug!("IPO {:#x} 没有曲线，跳过 {}", address, channel.name);
                continue;
            }
            match Self::ipo_curves(ipo) {
                Ok(curves) => {
                    action.insert_feature(channel.name.clone(), CurveSet::from_curves(curves))
                }
                Err(e) => log::warn!("跳过特征 {} ({}): {}", channel.name, record.name, e),
            }
        }
        action
    }

    fn ipo_curves(ipo: &IpoRecord) -> Result<Vec<BezierCurve>> {
        ipo.curves
            .iter()
            .map(|curve| {
                let kind = ChannelKind::from_adrcode(curve.adrcode);
                if kind.is_euler_rotation() {
                    let scaled: Vec<BezTripleRecord> =
                        curve.bezt.iter().map(scale_values).collect();
                    build_curve(kind, &scaled)
                } else {
                    build_curve(kind, &curve.bezt)
                }
            })
            .collect()
    }
}

fn build_curve(kind: ChannelKind, bezt: &[BezTripleRecord]) -> Result<BezierCurve> {
    BezierCurve::new(kind, bezt.iter().map(BezTripleRecord::to_control_point).collect())
}

/// 把旧版旋转值换算为弧度（Bernstein 混合对数值轴是线性的，缩放控制点即可）
fn scale_values(triple: &BezTripleRecord) -> BezTripleRecord {
    let mut vec = triple.vec;
    for point in vec.iter_mut() {
        point[1] *= LEGACY_ROTATION_FACTOR;
    }
    BezTripleRecord {
        vec,
        radius: triple.radius,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fcurve(path: &str, index: i32, keys: &[(f32, f32)]) -> FCurveRecord {
        FCurveRecord {
            rna_path: path.to_string(),
            array_index: index,
            bezt: keys.iter().map(|&(f, v)| BezTripleRecord::key(f, v)).collect(),
        }
    }

    #[test]
    fn test_schema_from_version() {
        assert_eq!(SchemaVersion::from_file_version(249), SchemaVersion::Legacy);
        assert_eq!(SchemaVersion::from_file_version(250), SchemaVersion::Modern);
        assert_eq!(SchemaVersion::from_file_version(279), SchemaVersion::Modern);
    }

    #[test]
    fn test_modern_action() {
        let record = ActionRecord {
            name: "wave".into(),
            groups: vec![
                ActionGroupRecord {
                    name: "Arm".into(),
                    channels: vec![
                        fcurve("pose.bones[\"Arm\"].location", 0, &[(1.0, 0.0), (20.0, 2.0)]),
                        fcurve("pose.bones[\"Arm\"].bbone_in", 0, &[(1.0, 0.0), (90.0, 2.0)]),
                    ],
                },
                ActionGroupRecord {
                    name: "Broken".into(),
                    channels: vec![fcurve("pose.bones[\"Broken\"].scale", 0, &[])],
                },
                ActionGroupRecord {
                    name: "Hand".into(),
                    channels: vec![fcurve(
                        "pose.bones[\"Hand\"].rotation_quaternion",
                        0,
                        &[(1.0, 1.0), (12.0, 1.0)],
                    )],
                },
            ],
            channels: Vec::new(),
        };
        let config = AnimationConfig::default();
        let index = LoadedFeatureIndex::new();
        let loader = ActionLoader::new(SchemaVersion::Modern, &config, &index);
        let action = loader.load(&record);

        assert_eq!(action.name(), "wave");
        assert_eq!(action.fps(), 25);
        assert_eq!(action.tracks_count(), 2);
        assert!(!action.has_track_name("Broken"));
        // 未知通道不参与结束帧
        assert_eq!(action.stop_frame(), 20);
        match action.feature("Arm").unwrap() {
            CurveSet::Channels(curves) => {
                assert_eq!(curves.len(), 1);
                assert!(curves.contains(ChannelKind::LocationX));
            }
            CurveSet::Constant(_) => panic!("expected channels"),
        }
    }

    #[test]
    fn test_legacy_action_resolves_ipo_by_address() {
        let index = LoadedFeatureIndex::new().with_ipo(IpoRecord {
            address: 0x1000,
            curves: vec![
                IpoCurveRecord {
                    adrcode: 1,
                    bezt: vec![BezTripleRecord::key(1.0, 0.0), BezTripleRecord::key(15.0, 3.0)],
                },
                IpoCurveRecord {
                    adrcode: 9,
                    bezt: vec![BezTripleRecord::key(1.0, 9.0)],
                },
            ],
        });
        let record = ActionRecord {
            name: "old".into(),
            groups: Vec::new(),
            channels: vec![
                ActionChannelRecord {
                    name: "Spine".into(),
                    ipo: Some(0x1000),
                },
                ActionChannelRecord {
                    name: "Dangling".into(),
                    ipo: Some(0x2000),
                },
                ActionChannelRecord {
                    name: "Empty".into(),
                    ipo: None,
                },
            ],
        };
        let config = AnimationConfig::default();
        let loader = ActionLoader::new(SchemaVersion::Legacy, &config, &index);
        let action = loader.load(&record);

        assert_eq!(action.tracks_count(), 1);
        assert_eq!(action.stop_frame(), 15);
        let spine = action.feature("Spine").unwrap();
        assert_eq!(spine.channel_value(ChannelKind::LocationX, 15), Some(3.0));
        // 9 * 10 度 = 90 度
        let rot = spine.channel_value(ChannelKind::RotationZ, 1).unwrap();
        assert!((rot - std::f64::consts::FRAC_PI_2).abs() < 1e-5);
    }

    #[test]
    fn test_schema_selects_list() {
        let record = ActionRecord {
            name: "mixed".into(),
            groups: vec![ActionGroupRecord {
                name: "Arm".into(),
                channels: vec![fcurve("location", 0, &[(1.0, 0.0)])],
            }],
            channels: Vec::new(),
        };
        let config = AnimationConfig::default();
        let index = LoadedFeatureIndex::new();
        let legacy = ActionLoader::new(SchemaVersion::Legacy, &config, &index);
        assert_eq!(legacy.load(&record).tracks_count(), 0);
        let modern = ActionLoader::new(SchemaVersion::Modern, &config, &index);
        assert_eq!(modern.load(&record).tracks_count(), 1);
    }
}
