//! 骨骼层级和 IK 代理骨骼

mod bone;
mod hierarchy;
mod manager;
mod pose_solver;

pub use bone::{flags, ik_flags, BoneNode, PoseChannel};
pub use hierarchy::{BoneHierarchyBuilder, BONE_ARMATURE_AXIS};
pub use manager::Skeleton;
pub use pose_solver::{PoseProxyNode, PoseSolver};

use glam::{Mat4, Quat, Vec3};

/// 骨骼变换数据
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoneTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for BoneTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl BoneTransform {
    pub const IDENTITY: BoneTransform = BoneTransform {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn new(translation: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            translation,
            rotation,
            scale,
        }
    }

    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// 分解矩阵（不支持剪切）
    pub fn from_matrix(matrix: &Mat4) -> Self {
        let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
        Self {
            translation,
            rotation: rotation.normalize(),
            scale,
        }
    }

    /// 以父变换为基准合成世界变换
    ///
    /// 缩放逐分量相乘，平移先缩放再旋转。
    pub fn combine_with_parent(&self, parent: &BoneTransform) -> BoneTransform {
        BoneTransform {
            scale: parent.scale * self.scale,
            rotation: (parent.rotation * self.rotation).normalize(),
            translation: parent.translation + parent.rotation * (parent.scale * self.translation),
        }
    }

    pub fn abs_diff_eq(&self, other: &BoneTransform, max_abs_diff: f32) -> bool {
        self.translation.abs_diff_eq(other.translation, max_abs_diff)
            && self.rotation.abs_diff_eq(other.rotation, max_abs_diff)
            && self.scale.abs_diff_eq(other.scale, max_abs_diff)
    }
}
