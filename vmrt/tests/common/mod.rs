//! Shared fixtures for runtime integration tests.

use vmrt::{FunctionDef, ModuleBuilder, Op, VmModule};
use vmrt_common::hal::types::{BinaryOp, ElementType, TensorType};

/// `arithmetic.simple_mul(4xf32, 4xf32) -> 4xf32`, elementwise multiply.
pub fn create_simple_mul_module() -> VmModule {
    let ty = TensorType::new([4], ElementType::F32);
    ModuleBuilder::new("arithmetic")
        .function(
            FunctionDef::new("simple_mul", "0rr_r")
                .arg_type(Some(ty.clone()))
                .arg_type(Some(ty))
                .registers(3)
                .op(Op::Binary {
                    op: BinaryOp::Mul,
                    lhs: 0,
                    rhs: 1,
                    dst: 2,
                })
                .op(Op::Return { results: vec![2] }),
        )
        .build_module()
        .expect("simple_mul module builds")
}
