//! 骨骼层级构建
//!
//! 分三遍完成：
//! 1. 展开骨骼记录（父先子后），计算每根骨骼的骨架空间矩阵
//! 2. 自上而下计算静止矩阵，子骨骼依赖父骨骼已经算好的逆总变换
//! 3. 整棵树建好后按需叠加姿态通道，得到姿态变换

use glam::{Mat4, Vec3, Vec4};

use super::{BoneNode, BoneTransform, PoseChannel, Skeleton};
use crate::animation::source::{BoneRecord, LoadedFeatureIndex};
use crate::config::AnimationConfig;
use crate::{AnimError, Result};

/// Z 轴向上的骨架矩阵换成 Y 轴向上
pub const BONE_ARMATURE_AXIS: Mat4 = Mat4::from_cols(
    Vec4::new(1.0, 0.0, 0.0, 0.0),
    Vec4::new(0.0, 0.0, -1.0, 0.0),
    Vec4::new(0.0, 1.0, 0.0, 0.0),
    Vec4::new(0.0, 0.0, 0.0, 1.0),
);

/// 骨骼层级构建器
pub struct BoneHierarchyBuilder<'a> {
    config: &'a AnimationConfig,
    armature_to_object: Mat4,
}

impl<'a> BoneHierarchyBuilder<'a> {
    pub fn new(config: &'a AnimationConfig, armature_to_object: Mat4) -> Self {
        Self {
            config,
            armature_to_object,
        }
    }

    /// 构建骨架
    pub fn build(&self, name: &str, roots: &[BoneRecord]) -> Result<Skeleton> {
        let mut nodes = self.collect(roots);
        for i in 0..nodes.len() {
            self.compute_rest(&mut nodes, i)?;
        }

        let mut skeleton = Skeleton::new(name);
        for node in nodes {
            skeleton.add_bone(node)?;
        }
        skeleton.update_model_transforms();

        log::info!(
            "骨架 {} 构建完成: {} 根骨骼, {} 个根",
            name,
            skeleton.bone_count(),
            roots.len()
        );
        Ok(skeleton)
    }

    /// 第一遍：展开记录并计算骨架空间矩阵
    pub fn collect(&self, roots: &[BoneRecord]) -> Vec<BoneNode> {
        let mut nodes = Vec::new();
        for root in roots {
            self.collect_into(root, None, &mut nodes);
        }
        nodes
    }

    fn collect_into(&self, record: &BoneRecord, parent: Option<usize>, nodes: &mut Vec<BoneNode>) {
        let index = nodes.len();
        let mut node = BoneNode::new(record.name.clone());
        node.address = record.address;
        node.parent_index = parent;
        node.length = record.length;
        node.flag = record.flag;
        node.armature_matrix = self.armature_matrix(record);
        nodes.push(node);

        if let Some(p) = parent {
            nodes[p].children.push(index);
        }
        for child in &record.children {
            self.collect_into(child, Some(index), nodes);
        }
    }

    fn armature_matrix(&self, record: &BoneRecord) -> Mat4 {
        let matrix = Mat4::from_cols_array_2d(&record.arm_mat);
        if self.config.fix_up_axis {
            matrix * BONE_ARMATURE_AXIS
        } else {
            matrix
        }
    }

    /// 第二遍：计算单根骨骼的静止矩阵和绑定变换
    ///
    /// 父骨骼的逆总变换必须已经算好，否则返回 `InvalidHierarchyOrder`。
    pub fn compute_rest(&self, nodes: &mut [BoneNode], index: usize) -> Result<()> {
        let node = nodes
            .get(index)
            .ok_or_else(|| AnimError::FeatureNotFound(format!("bone #{}", index)))?;

        let (inverse_parent, parent_length) = match node.parent_index {
            Some(p) => {
                let parent = nodes.get(p).ok_or_else(|| {
                    let message = format!("{}: missing parent #{}", node.name, p);
                    AnimError::InvalidHierarchyOrder(message)
                })?;
                let inverse = parent.inverse_total.ok_or_else(|| {
                    AnimError::InvalidHierarchyOrder(format!(
                        "{} processed before its parent {}",
                        node.name, parent.name
                    ))
                })?;
                (inverse, Some(parent.length))
            }
            None if self.config.fix_up_axis => (self.armature_to_object, None),
            None => (Mat4::IDENTITY, None),
        };

        let node = &mut nodes[index];
        node.inverse_total = Some(node.armature_matrix.inverse());
        node.rest_matrix = inverse_parent * node.armature_matrix;

        let mut bind = BoneTransform::from_matrix(&node.rest_matrix);
        if let (true, Some(length)) = (node.is_connected(), parent_length) {
            bind.translation = Vec3::new(0.0, length, 0.0);
        }
        node.set_bind(bind);
        log::debug!("骨骼 {} 绑定变换: {:?}", node.name, bind);
        Ok(())
    }

    /// 第三遍：叠加姿态通道，返回找到姿态通道的骨骼数
    ///
    /// 没有姿态通道的骨骼只保留绑定姿态。
    pub fn apply_pose_channels(
        &self,
        skeleton: &mut Skeleton,
        index: &LoadedFeatureIndex,
    ) -> usize {
        let mut applied = 0;
        for bone in skeleton.bones_mut() {
            let Some(record) = index.pose_channel(bone.address) else {
                log::debug!("骨骼 {} 没有姿态通道", bone.name);
                continue;
            };
            let channel = PoseChannel::from_record(record, self.config.fix_up_axis);
            bone.pose_transform = Some(channel.apply_to(&bone.bind));
            bone.pose_channel = Some(channel);
            applied += 1;
        }
        applied
    }
}
