//! Built-in spreadsheet functions
//!
//! Every function is described by a [`FunctionDef`] in the global
//! [`FunctionRegistry`]. The definition says how arguments reach the
//! implementation and whether it has its own array path; [`FunctionDef::invoke`]
//! does the routing.

pub mod aggregate;
pub mod info;
pub mod logical;
pub mod math;

use ahash::AHashMap;
use log::{debug, trace};
use once_cell::sync::Lazy;
use sheetcalc_core::ErrorCode;

use crate::broadcast::evaluate_n_array_args;
use crate::evaluator::EvaluationContext;
use crate::resolver::resolve_single_value;
use crate::value::ValueEval;

/// Implementation over arguments already resolved to scalars
pub type ScalarImpl =
    for<'a> fn(&[ValueEval<'a>], &EvaluationContext<'a>) -> Result<ValueEval<'a>, ErrorCode>;

/// Implementation over raw operands (references, areas, arrays)
pub type OperandsImpl = for<'a> fn(&[ValueEval<'a>], &EvaluationContext<'a>) -> ValueEval<'a>;

/// Array path, called with the anchor cell of the array result
pub type ArrayImpl =
    for<'a> fn(&[ValueEval<'a>], u32, u16, &EvaluationContext<'a>) -> ValueEval<'a>;

/// How arguments are handed to a function
#[derive(Clone, Copy)]
pub enum FunctionKind {
    /// Each argument is resolved to the value at the formula cell first
    Scalar(ScalarImpl),
    /// Arguments are passed unresolved
    Operands(OperandsImpl),
}

/// Function definition
#[derive(Clone, Copy)]
pub struct FunctionDef {
    /// Function name (uppercase)
    pub name: &'static str,
    /// Minimum arguments
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    pub kind: FunctionKind,
    /// Element-wise implementation used in an array context
    pub array: Option<ArrayImpl>,
    /// Arguments are evaluated in array mode (SUMPRODUCT)
    pub array_operands: bool,
}

impl FunctionDef {
    pub const fn scalar(
        name: &'static str,
        min_args: usize,
        max_args: Option<usize>,
        implementation: ScalarImpl,
    ) -> Self {
        Self {
            name,
            min_args,
            max_args,
            kind: FunctionKind::Scalar(implementation),
            array: None,
            array_operands: false,
        }
    }

    pub const fn operands(
        name: &'static str,
        min_args: usize,
        max_args: Option<usize>,
        implementation: OperandsImpl,
    ) -> Self {
        Self {
            name,
            min_args,
            max_args,
            kind: FunctionKind::Operands(implementation),
            array: None,
            array_operands: false,
        }
    }

    #[must_use]
    pub const fn with_array(mut self, implementation: ArrayImpl) -> Self {
        self.array = Some(implementation);
        self
    }

    #[must_use]
    pub const fn with_array_operands(mut self) -> Self {
        self.array_operands = true;
        self
    }

    pub fn accepts(&self, arg_count: usize) -> bool {
        arg_count >= self.min_args && self.max_args.map_or(true, |max| arg_count <= max)
    }

    /// Call the function with evaluated arguments
    ///
    /// A wrong argument count is `#VALUE!`. In an array context the array
    /// path is used when there is one and scalar functions are lifted
    /// element-wise; otherwise scalar functions see their arguments
    /// resolved at the formula cell. NaN and infinite results become
    /// `#NUM!`.
    pub fn invoke<'a>(&self, args: &[ValueEval<'a>], ctx: &EvaluationContext<'a>) -> ValueEval<'a> {
        if !self.accepts(args.len()) {
            debug!(
                "{} called with {} arguments, expects {}..{}",
                self.name,
                args.len(),
                self.min_args,
                self.max_args.map_or_else(|| "".to_string(), |max| max.to_string())
            );
            return ValueEval::Error(ErrorCode::Value);
        }

        let result = if ctx.is_array_context() {
            let (row, col) = ctx.array_anchor();
            match (self.array, self.kind) {
                (Some(array), _) => {
                    trace!("{}: array path at ({}, {})", self.name, row, col);
                    array(args, row, col, ctx)
                }
                (None, FunctionKind::Scalar(f)) => {
                    trace!("{}: lifted over arrays at ({}, {})", self.name, row, col);
                    evaluate_n_array_args(args, row, col, |values| {
                        check_number(f(values, ctx).unwrap_or_else(ValueEval::Error))
                    })
                }
                (None, FunctionKind::Operands(f)) => {
                    trace!("{}: operands", self.name);
                    f(args, ctx)
                }
            }
        } else {
            match self.kind {
                FunctionKind::Scalar(f) => {
                    trace!("{}: scalar", self.name);
                    call_scalar(f, args, ctx)
                }
                FunctionKind::Operands(f) => {
                    trace!("{}: operands", self.name);
                    f(args, ctx)
                }
            }
        };
        check_number(result)
    }
}

fn call_scalar<'a>(f: ScalarImpl, args: &[ValueEval<'a>], ctx: &EvaluationContext<'a>) -> ValueEval<'a> {
    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        match resolve_single_value(arg, ctx.row, ctx.col) {
            Ok(v) => values.push(v),
            Err(e) => return ValueEval::Error(e),
        }
    }
    f(&values, ctx).unwrap_or_else(ValueEval::Error)
}

fn check_number(value: ValueEval<'_>) -> ValueEval<'_> {
    match value {
        ValueEval::Number(n) if !n.is_finite() => ValueEval::Error(ErrorCode::Num),
        other => other,
    }
}

static REGISTRY: Lazy<FunctionRegistry> = Lazy::new(FunctionRegistry::new);

/// The built-in function registry
pub fn registry() -> &'static FunctionRegistry {
    &REGISTRY
}

/// Look up `name` and call it; unknown names are `#NAME?`
pub fn call_function<'a>(
    name: &str,
    args: &[ValueEval<'a>],
    ctx: &EvaluationContext<'a>,
) -> ValueEval<'a> {
    match registry().get(name) {
        Some(def) => def.invoke(args, ctx),
        None => {
            debug!("unknown function {}", name);
            ValueEval::Error(ErrorCode::Name)
        }
    }
}

/// Function registry
pub struct FunctionRegistry {
    functions: AHashMap<String, FunctionDef>,
}

impl FunctionRegistry {
    /// Create a new registry with all built-in functions
    pub fn new() -> Self {
        let mut registry = Self {
            functions: AHashMap::new(),
        };

        registry.register_aggregate_functions();
        registry.register_logical_functions();
        registry.register_info_functions();
        registry.register_math_functions();

        registry
    }

    /// Look up a function by name (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(&name.to_uppercase())
    }

    /// Register a function, replacing any previous definition
    pub fn register(&mut self, def: FunctionDef) {
        self.functions.insert(def.name.to_uppercase(), def);
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Registered names in no particular order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    fn register_aggregate_functions(&mut self) {
        use aggregate::*;

        let variadic: [(&'static str, OperandsImpl); 18] = [
            ("SUM", fn_sum),
            ("PRODUCT", fn_product),
            ("AVERAGE", fn_average),
            ("GEOMEAN", fn_geomean),
            ("MIN", fn_min),
            ("MAX", fn_max),
            ("MINA", fn_mina),
            ("MAXA", fn_maxa),
            ("SUMSQ", fn_sumsq),
            ("DEVSQ", fn_devsq),
            ("AVEDEV", fn_avedev),
            ("VAR", fn_var),
            ("VARP", fn_varp),
            ("STDEV", fn_stdev),
            ("STDEVP", fn_stdevp),
            ("MEDIAN", fn_median),
            ("COUNT", fn_count),
            ("COUNTA", fn_counta),
        ];
        for (name, f) in variadic {
            self.register(FunctionDef::operands(name, 1, None, f));
        }

        // COUNTBLANK takes a single range
        self.register(FunctionDef::operands("COUNTBLANK", 1, Some(1), fn_countblank));

        // SUBTOTAL(function_num, ref1, ...)
        self.register(FunctionDef::operands("SUBTOTAL", 2, None, fn_subtotal));

        // SUMPRODUCT evaluates its arguments as arrays
        self.register(
            FunctionDef::operands("SUMPRODUCT", 1, None, fn_sumproduct).with_array_operands(),
        );
    }

    fn register_logical_functions(&mut self) {
        use logical::*;

        // IF broadcasts condition and both branches in an array context
        self.register(FunctionDef::operands("IF", 2, Some(3), fn_if).with_array(fn_if_array));
        self.register(
            FunctionDef::operands("IFERROR", 2, Some(2), fn_iferror).with_array(fn_iferror_array),
        );
        self.register(FunctionDef::operands("IFNA", 2, Some(2), fn_ifna).with_array(fn_ifna_array));

        self.register(FunctionDef::operands("AND", 1, None, fn_and));
        self.register(FunctionDef::operands("OR", 1, None, fn_or));
        self.register(FunctionDef::scalar("NOT", 1, Some(1), fn_not));
        self.register(FunctionDef::scalar("TRUE", 0, Some(0), fn_true));
        self.register(FunctionDef::scalar("FALSE", 0, Some(0), fn_false));
    }

    fn register_info_functions(&mut self) {
        use info::*;

        self.register(FunctionDef::operands("AREAS", 1, Some(1), fn_areas));
        self.register(FunctionDef::operands("ROWS", 1, Some(1), fn_rows));
        self.register(FunctionDef::operands("COLUMNS", 1, Some(1), fn_columns));

        let predicates: [(&'static str, OperandsImpl, ArrayImpl); 7] = [
            ("ISERROR", fn_iserror, fn_iserror_array),
            ("ISERR", fn_iserr, fn_iserr_array),
            ("ISNA", fn_isna, fn_isna_array),
            ("ISBLANK", fn_isblank, fn_isblank_array),
            ("ISNUMBER", fn_isnumber, fn_isnumber_array),
            ("ISTEXT", fn_istext, fn_istext_array),
            ("ISLOGICAL", fn_islogical, fn_islogical_array),
        ];
        for (name, f, array) in predicates {
            self.register(FunctionDef::operands(name, 1, Some(1), f).with_array(array));
        }

        self.register(FunctionDef::scalar("NA", 0, Some(0), fn_na));
    }

    fn register_math_functions(&mut self) {
        use math::*;

        self.register(FunctionDef::scalar("ABS", 1, Some(1), fn_abs));
        self.register(FunctionDef::scalar("SIGN", 1, Some(1), fn_sign));
        self.register(FunctionDef::scalar("SQRT", 1, Some(1), fn_sqrt));
        self.register(FunctionDef::scalar("INT", 1, Some(1), fn_int));
        self.register(FunctionDef::scalar("ROUND", 2, Some(2), fn_round));
        self.register(FunctionDef::scalar("MOD", 2, Some(2), fn_mod));
        self.register(FunctionDef::scalar("POWER", 2, Some(2), fn_power));
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
