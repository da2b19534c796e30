//! 动画导入配置
//!
//! 所有参数扁平化，由调用方显式构造并传入各个构建器，不使用全局状态。

/// 缺失缩放通道时使用的缩放值
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleFallback {
    /// (1, 1, 1)
    Identity,
    /// (0, 0, 0)，兼容旧版导入结果
    ///
    /// 没有缩放曲线的骨骼会被压缩成一个点，只在需要复现旧结果时使用。
    SourceCompatible,
}

/// 向上的坐标轴
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpAxis {
    Y,
    Z,
}

/// 动作与骨架的匹配方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationMatchMethod {
    /// 至少一个特征名与骨骼名匹配即可使用该动作，不匹配的特征会被移除
    AtLeastOneNameMatch,
    /// 所有特征名都必须与骨骼名匹配，动作原样使用
    AllNamesMatch,
}

/// 动画配置（扁平化，不嵌套）
#[derive(Debug, Clone)]
pub struct AnimationConfig {
    /// 每秒帧数，默认 25
    pub fps: u32,
    /// 是否把 Z 轴向上的源数据转换为 Y 轴向上，默认 true
    pub fix_up_axis: bool,
    /// 缺失缩放通道时的缩放值，默认 Identity
    pub scale_fallback: ScaleFallback,
    /// 根代理骨骼末端点所沿的轴，默认 Y
    pub up_axis: UpAxis,
    /// 动作与骨架的匹配方式，默认 AtLeastOneNameMatch
    pub match_method: AnimationMatchMethod,
}

impl AnimationConfig {
    /// 默认帧率
    pub const DEFAULT_FPS: u32 = 25;

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps.max(1);
        self
    }

    pub fn with_fix_up_axis(mut self, fix_up_axis: bool) -> Self {
        self.fix_up_axis = fix_up_axis;
        self
    }

    pub fn with_scale_fallback(mut self, scale_fallback: ScaleFallback) -> Self {
        self.scale_fallback = scale_fallback;
        self
    }
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            fps: Self::DEFAULT_FPS,
            fix_up_axis: true,
            scale_fallback: ScaleFallback::Identity,
            up_axis: UpAxis::Y,
            match_method: AnimationMatchMethod::AtLeastOneNameMatch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AnimationConfig::default();
        assert_eq!(config.fps, 25);
        assert!(config.fix_up_axis);
        assert_eq!(config.scale_fallback, ScaleFallback::Identity);
    }

    #[test]
    fn test_fps_never_zero() {
        let config = AnimationConfig::default().with_fps(0);
        assert_eq!(config.fps, 1);
    }
}
