//! 测试工具模块
//!
//! 提供测试相关的工具函数和辅助功能
