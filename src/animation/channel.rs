//! 通道类型识别
//!
//! 新版数据以 "路径 + 数组下标" 描述通道（例如 `pose.bones["Arm"].location` + 1），
//! 旧版 IPO 曲线以整数 adrcode 描述通道。两者都归一到 [`ChannelKind`]。

use crate::{AnimError, Result};

/// 曲线驱动的语义分量
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChannelKind {
    LocationX,
    LocationY,
    LocationZ,
    RotationX,
    RotationY,
    RotationZ,
    QuaternionW,
    QuaternionX,
    QuaternionY,
    QuaternionZ,
    ScaleX,
    ScaleY,
    ScaleZ,
    Unknown,
}

/// 旧版 IPO adrcode
pub mod adrcode {
    pub const LOC_X: i32 = 1;
    pub const ROT_X: i32 = 7;
    pub const SIZE_X: i32 = 13;
    pub const QUAT_W: i32 = 25;
}

const LOCATION: [ChannelKind; 3] = [
    ChannelKind::LocationX,
    ChannelKind::LocationY,
    ChannelKind::LocationZ,
];
const ROTATION: [ChannelKind; 3] = [
    ChannelKind::RotationX,
    ChannelKind::RotationY,
    ChannelKind::RotationZ,
];
const QUATERNION: [ChannelKind; 4] = [
    ChannelKind::QuaternionW,
    ChannelKind::QuaternionX,
    ChannelKind::QuaternionY,
    ChannelKind::QuaternionZ,
];
const SCALE: [ChannelKind; 3] = [ChannelKind::ScaleX, ChannelKind::ScaleY, ChannelKind::ScaleZ];

impl ChannelKind {
    /// 从旧版 adrcode 转换，未知代码返回 Unknown
    pub fn from_adrcode(code: i32) -> Self {
        let offset = |base: i32, len: usize| -> Option<usize> {
            let i = code - base;
            (i >= 0 && (i as usize) < len).then_some(i as usize)
        };
        if let Some(i) = offset(adrcode::LOC_X, LOCATION.len()) {
            return LOCATION[i];
        }
        if let Some(i) = offset(adrcode::ROT_X, ROTATION.len()) {
            return ROTATION[i];
        }
        if let Some(i) = offset(adrcode::SIZE_X, SCALE.len()) {
            return SCALE[i];
        }
        if let Some(i) = offset(adrcode::QUAT_W, QUATERNION.len()) {
            return QUATERNION[i];
        }
        ChannelKind::Unknown
    }

    pub fn is_location(self) -> bool {
        LOCATION.contains(&self)
    }

    pub fn is_euler_rotation(self) -> bool {
        ROTATION.contains(&self)
    }

    pub fn is_quaternion(self) -> bool {
        QUATERNION.contains(&self)
    }

    pub fn is_scale(self) -> bool {
        SCALE.contains(&self)
    }
}

/// 通道描述（路径 + 数组下标）
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelDescriptor {
    pub path: String,
    pub array_index: i32,
}

impl ChannelDescriptor {
    pub fn new(path: impl Into<String>, array_index: i32) -> Self {
        Self {
            path: path.into(),
            array_index,
        }
    }

    /// 识别通道类型
    ///
    /// 路径后缀无法识别或者下标越界时返回 `UnknownChannelPath`，由调用方跳过该通道。
    pub fn classify(&self) -> Result<ChannelKind> {
        // rotation_quaternion 必须先于 rotation 判断
        let group: &[ChannelKind] = if self.path.ends_with("location") {
            &LOCATION
        } else if self.path.ends_with("rotation_quaternion") {
            &QUATERNION
        } else if self.path.ends_with("scale") {
            &SCALE
        } else if self.path.ends_with("rotation_euler") || self.path.ends_with("rotation") {
            &ROTATION
        } else {
            return Err(AnimError::UnknownChannelPath(self.path.clone()));
        };

        usize::try_from(self.array_index)
            .ok()
            .and_then(|i| group.get(i).copied())
            .ok_or_else(|| {
                AnimError::UnknownChannelPath(format!("{}[{}]", self.path, self.array_index))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_paths() {
        let cases = [
            ("pose.bones[\"Arm\"].location", 0, ChannelKind::LocationX),
            ("pose.bones[\"Arm\"].location", 2, ChannelKind::LocationZ),
            ("pose.bones[\"Arm\"].rotation_quaternion", 0, ChannelKind::QuaternionW),
            ("pose.bones[\"Arm\"].rotation_quaternion", 3, ChannelKind::QuaternionZ),
            ("pose.bones[\"Arm\"].scale", 1, ChannelKind::ScaleY),
            ("rotation_euler", 1, ChannelKind::RotationY),
            ("rotation", 2, ChannelKind::RotationZ),
        ];
        for (path, index, expected) in cases {
            let kind = ChannelDescriptor::new(path, index).classify().unwrap();
            assert_eq!(kind, expected, "{path}[{index}]");
        }
    }

    #[test]
    fn test_unknown_path() {
        let err = ChannelDescriptor::new("pose.bones[\"Arm\"].bbone_curveinx", 0)
            .classify()
            .unwrap_err();
        assert!(matches!(err, AnimError::UnknownChannelPath(_)));
    }

    #[test]
    fn test_index_out_of_range() {
        assert!(ChannelDescriptor::new("location", 3).classify().is_err());
        assert!(ChannelDescriptor::new("location", -1).classify().is_err());
        assert!(ChannelDescriptor::new("rotation_quaternion", 3).classify().is_ok());
    }

    #[test]
    fn test_adrcodes() {
        assert_eq!(ChannelKind::from_adrcode(1), ChannelKind::LocationX);
        assert_eq!(ChannelKind::from_adrcode(3), ChannelKind::LocationZ);
        assert_eq!(ChannelKind::from_adrcode(8), ChannelKind::RotationY);
        assert_eq!(ChannelKind::from_adrcode(15), ChannelKind::ScaleZ);
        assert_eq!(ChannelKind::from_adrcode(25), ChannelKind::QuaternionW);
        assert_eq!(ChannelKind::from_adrcode(28), ChannelKind::QuaternionZ);
        assert_eq!(ChannelKind::from_adrcode(4), ChannelKind::Unknown);
        assert_eq!(ChannelKind::from_adrcode(0), ChannelKind::Unknown);
    }
}
