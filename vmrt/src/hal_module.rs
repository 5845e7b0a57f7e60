//! Built-in `hal` module, registered first in every context.

use crate::error::Result;
use crate::module::{FunctionDef, ModuleBuilder, Op, VmModule};
use vmrt_common::consts::HAL_MODULE_NAME;

/// Build the `hal` module.
pub fn hal_module() -> Result<VmModule> {
    ModuleBuilder::new(HAL_MODULE_NAME)
        .function(
            FunctionDef::new("buffer_view.rank", "0r_i")
                .registers(2)
                .op(Op::Rank { src: 0, dst: 1 })
                .op(Op::Return { results: vec![1] }),
        )
        .function(
            FunctionDef::new("buffer_view.dim", "0ri_I")
                .registers(3)
                .op(Op::Dim {
                    src: 0,
                    axis: 1,
                    dst: 2,
                })
                .op(Op::Return { results: vec![2] }),
        )
        .function(
            FunctionDef::new("buffer_view.element_count", "0r_I")
                .registers(2)
                .op(Op::ElementCount { src: 0, dst: 1 })
                .op(Op::Return { results: vec![1] }),
        )
        .build_module()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exports_buffer_view_queries() {
        let module = hal_module().unwrap();
        assert_eq!(module.name(), "hal");
        assert_eq!(
            module.function_names().collect::<Vec<_>>(),
            [
                "buffer_view.rank",
                "buffer_view.dim",
                "buffer_view.element_count"
            ]
        );
        assert_eq!(module.signature("buffer_view.dim").unwrap().to_string(), "0ri_I");
    }
}
