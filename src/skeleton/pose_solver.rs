//! IK 代理骨骼
//!
//! 外部 IK 迭代通过 `rotate` 反复旋转代理骨骼链，每帧结果写入预分配的槽位，
//! 最后 `commit` 一次性写回轨道，或作为单次姿态写入骨骼的用户变换。
//! 代理之间的父子关系用索引表示，每个代理最多一个子代理。

use glam::{Quat, Vec3};

use super::{BoneTransform, Skeleton};
use crate::animation::{Animation, Track};
use crate::config::UpAxis;
use crate::{AnimError, Result};

/// 代理骨骼
#[derive(Clone, Debug)]
pub struct PoseProxyNode {
    bone_index: usize,
    /// 是否对应动画中的轨道（否则为单次姿态探针）
    track_backed: bool,
    parent: Option<usize>,
    child: Option<usize>,
    /// 构建时的模型空间快照
    initial: BoneTransform,
    local: BoneTransform,
    world: BoneTransform,
    translations: Vec<Vec3>,
    rotations: Vec<Quat>,
    scales: Vec<Vec3>,
}

impl PoseProxyNode {
    fn new(bone_index: usize, initial: BoneTransform, track: Option<&Track>) -> Self {
        let (translations, rotations, scales) = match track {
            Some(track) => (
                track.translations().to_vec(),
                track.rotations().to_vec(),
                track.scales().to_vec(),
            ),
            None => (
                vec![initial.translation],
                vec![initial.rotation],
                vec![initial.scale],
            ),
        };
        Self {
            bone_index,
            track_backed: track.is_some(),
            parent: None,
            child: None,
            initial,
            local: initial,
            world: initial,
            translations,
            rotations,
            scales,
        }
    }

    pub fn bone_index(&self) -> usize {
        self.bone_index
    }

    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    pub fn child(&self) -> Option<usize> {
        self.child
    }

    pub fn local(&self) -> &BoneTransform {
        &self.local
    }

    pub fn world(&self) -> &BoneTransform {
        &self.world
    }

    pub fn frame_count(&self) -> usize {
        self.rotations.len()
    }

    /// 第 frame 帧槽位中的局部变换
    pub fn slot(&self, frame: usize) -> Option<BoneTransform> {
        Some(BoneTransform {
            translation: *self.translations.get(frame)?,
            rotation: *self.rotations.get(frame)?,
            scale: *self.scales.get(frame)?,
        })
    }
}

/// 代理骨骼集合
#[derive(Clone, Debug)]
pub struct PoseSolver {
    nodes: Vec<PoseProxyNode>,
    up_axis: UpAxis,
    committed: bool,
}

impl PoseSolver {
    pub fn new(up_axis: UpAxis) -> Self {
        Self {
            nodes: Vec::new(),
            up_axis,
            committed: false,
        }
    }

    /// 为骨骼链创建代理
    ///
    /// 从末端骨骼走到根骨骼，为每根在动画中有轨道的骨骼创建一个代理，
    /// 靠近根的代理把前一个代理作为唯一子代理。
    pub fn for_chain(
        skeleton: &Skeleton,
        end_bone: usize,
        animation: &Animation,
        up_axis: UpAxis,
    ) -> Result<Self> {
        let mut solver = Self::new(up_axis);
        let mut previous: Option<usize> = None;
        for bone in skeleton.chain_to_root(end_bone) {
            let Some(track) = animation.bone_track(bone) else {
                continue;
            };
            let proxy = solver.add_proxy(skeleton, bone, Some(track))?;
            if let Some(child) = previous {
                solver.attach_child(proxy, child)?;
            }
            previous = Some(proxy);
        }

        if solver.nodes.is_empty() {
            return Err(AnimError::FeatureNotFound(format!(
                "no tracks on the chain ending at bone #{} in {}",
                end_bone, animation.name
            )));
        }
        log::debug!("IK 代理链: {} 个代理", solver.nodes.len());
        Ok(solver)
    }

    /// 单次姿态探针（一个槽位，不对应轨道）
    pub fn probe(skeleton: &Skeleton, bone: usize, up_axis: UpAxis) -> Result<Self> {
        let mut solver = Self::new(up_axis);
        solver.add_proxy(skeleton, bone, None)?;
        Ok(solver)
    }

    /// 添加代理，返回代理索引
    pub fn add_proxy(
        &mut self,
        skeleton: &Skeleton,
        bone: usize,
        track: Option<&Track>,
    ) -> Result<usize> {
        self.ensure_open()?;
        let initial = skeleton.model_transform(bone).ok_or_else(|| {
            AnimError::FeatureNotFound(format!("bone #{} in {}", bone, skeleton.name()))
        })?;
        self.nodes.push(PoseProxyNode::new(bone, initial, track));
        Ok(self.nodes.len() - 1)
    }

    /// 把 child 挂到 parent 下，每个代理最多一个子代理
    pub fn attach_child(&mut self, parent: usize, child: usize) -> Result<()> {
        self.ensure_open()?;
        self.node(parent)?;
        self.node(child)?;
        if parent == child {
            return Err(AnimError::InvalidChainTopology(format!(
                "proxy #{} cannot be its own child",
                parent
            )));
        }
        if let Some(existing) = self.nodes[parent].child {
            return Err(AnimError::InvalidChainTopology(format!(
                "proxy #{} already has child #{}",
                parent, existing
            )));
        }
        if let Some(existing) = self.nodes[child].parent {
            return Err(AnimError::InvalidChainTopology(format!(
                "proxy #{} already attached to #{}",
                child, existing
            )));
        }

        self.nodes[parent].child = Some(child);
        self.nodes[child].parent = Some(parent);
        self.refresh_from(child);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn proxy(&self, index: usize) -> Option<&PoseProxyNode> {
        self.nodes.get(index)
    }

    /// 链的根代理（没有父代理的第一个）
    pub fn chain_root(&self) -> Option<usize> {
        self.nodes.iter().position(|n| n.parent.is_none())
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// 恢复到构建时的模型空间快照
    pub fn reset(&mut self, proxy: usize) -> Result<()> {
        self.ensure_open()?;
        let node = self.node_mut(proxy)?;
        node.local = node.initial;
        self.refresh_from(proxy);
        Ok(())
    }

    /// 追加局部旋转并记录到 frame 帧槽位（同一帧多次写入以最后一次为准）
    pub fn rotate(&mut self, proxy: usize, rotation: Quat, frame: usize) -> Result<()> {
        self.ensure_open()?;
        let node = self.node_mut(proxy)?;
        let len = node.frame_count();
        if frame >= len {
            return Err(AnimError::FrameOutOfRange { frame, len });
        }
        node.local.rotation = (node.local.rotation * rotation).normalize();

        self.update_world(proxy);
        if let Some(child) = self.nodes[proxy].child {
            self.update_world(child);
        }

        let node = &mut self.nodes[proxy];
        node.translations[frame] = node.local.translation;
        node.rotations[frame] = node.local.rotation;
        node.scales[frame] = node.local.scale;
        Ok(())
    }

    /// 末端位置
    ///
    /// 根代理返回沿向上轴、长度为局部缩放的向量；
    /// 其他代理返回父代理与自身的世界位置差，乘以自身的世界缩放。
    pub fn end_point(&self, proxy: usize) -> Result<Vec3> {
        let node = self.node(proxy)?;
        Ok(match node.parent {
            None => match self.up_axis {
                UpAxis::Y => Vec3::new(0.0, node.local.scale.y, 0.0),
                UpAxis::Z => Vec3::new(0.0, 0.0, node.local.scale.z),
            },
            Some(parent) => {
                (self.nodes[parent].world.translation - node.world.translation) * node.world.scale
            }
        })
    }

    /// 提交结果（终止状态）
    ///
    /// 有轨道的代理用槽位覆盖对应轨道的全部样本（时间轴不变）；
    /// 探针把 0 号槽位设为骨骼的用户变换，然后关闭用户控制。
    /// 任何轨道或探针骨骼缺失时不写入任何数据。
    pub fn commit(&mut self, tracks: &mut [Track], skeleton: &mut Skeleton) -> Result<()> {
        self.ensure_open()?;

        let mut targets = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if !node.track_backed {
                if skeleton.get_bone(node.bone_index).is_none() {
                    return Err(AnimError::FeatureNotFound(format!(
                        "bone #{} of {}",
                        node.bone_index,
                        skeleton.bone_count()
                    )));
                }
                targets.push(None);
                continue;
            }
            let position = tracks
                .iter()
                .position(|t| t.target_bone_index() == Some(node.bone_index))
                .ok_or_else(|| {
                    AnimError::FeatureNotFound(format!("track of bone #{}", node.bone_index))
                })?;
            if tracks[position].frame_count() != node.frame_count() {
                return Err(AnimError::FrameOutOfRange {
                    frame: node.frame_count(),
                    len: tracks[position].frame_count(),
                });
            }
            targets.push(Some(position));
        }

        for (node, target) in self.nodes.iter().zip(targets) {
            match target {
                Some(position) => {
                    let track = &mut tracks[position];
                    let times = track.times().to_vec();
                    track.set_keyframes(
                        times,
                        node.translations.clone(),
                        node.rotations.clone(),
                        node.scales.clone(),
                    )?;
                }
                None => {
                    let pose = node.slot(0).unwrap_or(node.initial);
                    skeleton.set_user_control(node.bone_index, true)?;
                    skeleton.set_user_transform(node.bone_index, &pose)?;
                    skeleton.set_user_control(node.bone_index, false)?;
                }
            }
        }

        self.committed = true;
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.committed {
            Err(AnimError::ProxyCommitted)
        } else {
            Ok(())
        }
    }

    fn node(&self, proxy: usize) -> Result<&PoseProxyNode> {
        self.nodes
            .get(proxy)
            .ok_or_else(|| AnimError::FeatureNotFound(format!("proxy #{}", proxy)))
    }

    fn node_mut(&mut self, proxy: usize) -> Result<&mut PoseProxyNode> {
        self.nodes
            .get_mut(proxy)
            .ok_or_else(|| AnimError::FeatureNotFound(format!("proxy #{}", proxy)))
    }

    fn update_world(&mut self, proxy: usize) {
        let world = match self.nodes[proxy].parent {
            Some(parent) => self.nodes[proxy]
                .local
                .combine_with_parent(&self.nodes[parent].world),
            None => self.nodes[proxy].local,
        };
        self.nodes[proxy].world = world;
    }

    /// 从 proxy 开始沿子代理向下刷新世界变换
    fn refresh_from(&mut self, proxy: usize) {
        let mut current = Some(proxy);
        while let Some(i) = current {
            self.update_world(i);
            current = self.nodes[i].child;
        }
    }
}
