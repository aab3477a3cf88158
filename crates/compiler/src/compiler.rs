//! The single-pass Pratt-parsing compiler (spec.md §4.4).
//!
//! There is no separate AST: every grammar production emits bytecode
//! directly into the current function's chunk as it is recognized. State
//! that would otherwise live on an AST lives instead on two explicit
//! stacks for the duration of a compile: one `FunctionState` per nested
//! function/method body, and one `ClassState` per nested class body.

use corvid_core::{GcRoots, Heap, LoxFunction, LoxString, NoRoots, Obj, ObjRef, OpCode, Value};

use crate::error::{CompileDiagnostic, CompileError};
use crate::scanner::{Scanner, Token, TokenKind};

const MAX_LOCALS: usize = 256;
const MAX_UPVALUES: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
#[repr(u8)]
enum Precedence {
    None = 0,
    Assignment,
    Or,
    And,
    Equality,
    Comparison,
    Term,
    Factor,
    Unary,
    Call,
    Primary,
}

impl Precedence {
    fn next(self) -> Precedence {
        use Precedence::*;
        match self {
            None => Assignment,
            Assignment => Or,
            Or => And,
            And => Equality,
            Equality => Comparison,
            Comparison => Term,
            Term => Factor,
            Factor => Unary,
            Unary => Call,
            Call => Primary,
            Primary => Primary,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum FunctionKind {
    Script,
    Function,
    Method,
    Initializer,
}

struct Local {
    name: String,
    depth: i32,
    is_captured: bool,
}

#[derive(Clone, Copy)]
struct UpvalueInfo {
    index: u8,
    is_local: bool,
}

struct FunctionState {
    function_ref: ObjRef<LoxFunction>,
    kind: FunctionKind,
    locals: Vec<Local>,
    upvalues: Vec<UpvalueInfo>,
    scope_depth: i32,
}

struct ClassState {
    has_superclass: bool,
}

/// Lets the compiler hand the collector its in-flight function objects as
/// GC roots, per spec.md §9's "expose a traversal hook from the compiler
/// module to the collector" note -- a function being compiled is only
/// reachable from this stack, nowhere else in the heap yet.
struct CompilerRoots<'a> {
    refs: &'a [ObjRef<LoxFunction>],
}

impl GcRoots for CompilerRoots<'_> {
    fn mark_roots(&self, heap: &mut Heap) {
        for r in self.refs {
            heap.mark_object_ref(*r);
        }
    }
}

struct Compiler<'h> {
    heap: &'h mut Heap,
    scanner: Scanner,
    previous: Token,
    current: Token,
    had_error: bool,
    panic_mode: bool,
    diagnostics: Vec<CompileDiagnostic>,
    functions: Vec<FunctionState>,
    classes: Vec<ClassState>,
}

/// Compile `source` into a top-level script function. On success, the
/// returned function's chunk ends in an implicit `nil; return`.
pub fn compile(source: &str, heap: &mut Heap) -> Result<ObjRef<LoxFunction>, CompileError> {
    tracing::debug!(source_len = source.len(), "compiling source");
    let mut compiler = Compiler::new(heap, source);
    compiler.advance();
    while !compiler.match_token(TokenKind::Eof) {
        compiler.declaration();
    }
    compiler.emit_return();
    if compiler.had_error {
        tracing::debug!(diagnostics = compiler.diagnostics.len(), "compile failed");
        Err(CompileError { diagnostics: compiler.diagnostics })
    } else {
        let state = compiler.functions.pop().expect("script function state");
        Ok(state.function_ref)
    }
}

impl<'h> Compiler<'h> {
    fn new(heap: &'h mut Heap, source: &str) -> Self {
        let script_ref = heap.alloc_function(LoxFunction::new(None), &NoRoots);
        let blank = Token { kind: TokenKind::Eof, lexeme: String::new(), line: 0 };
        Compiler {
            heap,
            scanner: Scanner::new(source),
            previous: blank.clone(),
            current: blank,
            had_error: false,
            panic_mode: false,
            diagnostics: Vec::new(),
            functions: vec![FunctionState {
                function_ref: script_ref,
                kind: FunctionKind::Script,
                locals: vec![Local { name: String::new(), depth: 0, is_captured: false }],
                upvalues: Vec::new(),
                scope_depth: 0,
            }],
            classes: Vec::new(),
        }
    }

    // ---- token stream -----------------------------------------------

    fn advance(&mut self) {
        self.previous = self.current.clone();
        loop {
            self.current = self.scanner.scan_token();
            if self.current.kind != TokenKind::Error {
                break;
            }
            let message = self.current.lexeme.clone();
            self.error_at_current(&message);
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    fn match_token(&mut self, kind: TokenKind) -> bool {
        if !self.check(kind) {
            return false;
        }
        self.advance();
        true
    }

    fn consume(&mut self, kind: TokenKind, message: &str) {
        if self.current.kind == kind {
            self.advance();
            return;
        }
        self.error_at_current(message);
    }

    // ---- error reporting ---------------------------------------------

    fn error_at_current(&mut self, message: &str) {
        let token = self.current.clone();
        self.error_at(&token, message);
    }

    fn error(&mut self, message: &str) {
        let token = self.previous.clone();
        self.error_at(&token, message);
    }

    fn error_at(&mut self, token: &Token, message: &str) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;
        self.had_error = true;
        let at = if token.kind == TokenKind::Eof { "end".to_string() } else { token.lexeme.clone() };
        self.diagnostics.push(CompileDiagnostic { line: token.line, at, message: message.to_string() });
    }

    fn synchronize(&mut self) {
        tracing::debug!(line = self.current.line, "resyncing after a parse error");
        self.panic_mode = false;
        while self.current.kind != TokenKind::Eof {
            if self.previous.kind == TokenKind::Semicolon {
                return;
            }
            match self.current.kind {
                TokenKind::Class
                | TokenKind::Fun
                | TokenKind::Var
                | TokenKind::For
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Print
                | TokenKind::Return => return,
                _ => self.advance(),
            }
        }
    }

    // ---- heap plumbing -------------------------------------------------

    fn roots(&self) -> Vec<ObjRef<LoxFunction>> {
        self.functions.iter().map(|f| f.function_ref).collect()
    }

    fn current_function_ref(&self) -> ObjRef<LoxFunction> {
        self.functions.last().expect("at least one function state").function_ref
    }

    fn current_chunk_len(&self) -> usize {
        self.heap.chunk(self.current_function_ref()).len()
    }

    fn emit_u8(&mut self, byte: u8) {
        let line = self.previous.line;
        let func = self.current_function_ref();
        self.heap.chunk_mut(func).write_u8(byte, line);
    }

    fn emit_op(&mut self, op: OpCode) {
        self.emit_u8(op as u8);
    }

    fn emit_jump(&mut self, op: OpCode) -> usize {
        self.emit_op(op);
        self.emit_u8(0xff);
        self.emit_u8(0xff);
        self.current_chunk_len() - 2
    }

    fn patch_jump(&mut self, offset: usize) {
        let func = self.current_function_ref();
        if self.heap.chunk_mut(func).patch_jump(offset).is_err() {
            self.error("Too much code to jump over.");
        }
    }

    fn emit_loop(&mut self, loop_start: usize) {
        self.emit_op(OpCode::Loop);
        let offset = self.current_chunk_len() - loop_start + 2;
        if offset > u16::MAX as usize {
            self.error("Loop body too large.");
        }
        self.emit_u8(((offset >> 8) & 0xff) as u8);
        self.emit_u8((offset & 0xff) as u8);
    }

    fn make_constant(&mut self, value: Value) -> usize {
        let func = self.current_function_ref();
        self.heap.chunk_mut(func).add_constant(value)
    }

    fn emit_constant(&mut self, value: Value) {
        let idx = self.make_constant(value);
        if idx < 256 {
            self.emit_op(OpCode::Constant);
            self.emit_u8(idx as u8);
        } else if idx < (1 << 24) {
            self.emit_op(OpCode::ConstantLong);
            self.emit_u8((idx & 0xff) as u8);
            self.emit_u8(((idx >> 8) & 0xff) as u8);
            self.emit_u8(((idx >> 16) & 0xff) as u8);
        } else {
            self.error("Too many constants in one chunk.");
        }
    }

    fn identifier_constant(&mut self, name: &str) -> u8 {
        let roots = self.roots();
        let str_ref: ObjRef<LoxString> = self.heap.intern(name, &CompilerRoots { refs: &roots });
        let idx = self.make_constant(Value::Obj(Obj::Str(str_ref)));
        if idx > u8::MAX as usize {
            self.error("Too many constants in one chunk.");
            0
        } else {
            idx as u8
        }
    }

    fn emit_return(&mut self) {
        if self.functions.last().expect("function state").kind == FunctionKind::Initializer {
            self.emit_op(OpCode::GetLocal);
            self.emit_u8(0);
        } else {
            self.emit_op(OpCode::Nil);
        }
        self.emit_op(OpCode::Return);
    }

    // ---- scopes and variables ------------------------------------------

    fn begin_scope(&mut self) {
        self.functions.last_mut().expect("function state").scope_depth += 1;
    }

    fn end_scope(&mut self) {
        let new_depth = self.functions.last().expect("function state").scope_depth - 1;
        loop {
            let should_pop = matches!(
                self.functions.last().expect("function state").locals.last(),
                Some(l) if l.depth > new_depth
            );
            if !should_pop {
                break;
            }
            let is_captured =
                self.functions.last().expect("function state").locals.last().expect("checked above").is_captured;
            if is_captured {
                self.emit_op(OpCode::CloseUpvalue);
            } else {
                self.emit_op(OpCode::Pop);
            }
            self.functions.last_mut().expect("function state").locals.pop();
        }
        self.functions.last_mut().expect("function state").scope_depth = new_depth;
    }

    fn add_local(&mut self, name: String) {
        let func_index = self.functions.len() - 1;
        if self.functions[func_index].locals.len() >= MAX_LOCALS {
            self.error("Too many local variables in function.");
            return;
        }
        self.functions[func_index].locals.push(Local { name, depth: -1, is_captured: false });
    }

    fn declare_variable(&mut self) {
        let func_index = self.functions.len() - 1;
        if self.functions[func_index].scope_depth == 0 {
            return;
        }
        let name = self.previous.lexeme.clone();
        let scope_depth = self.functions[func_index].scope_depth;
        let mut duplicate = false;
        for local in self.functions[func_index].locals.iter().rev() {
            if local.depth != -1 && local.depth < scope_depth {
                break;
            }
            if local.name == name {
                duplicate = true;
                break;
            }
        }
        if duplicate {
            self.error("Already a variable with this name in this scope.");
            return;
        }
        self.add_local(name);
    }

    fn parse_variable(&mut self, message: &str) -> u8 {
        self.consume(TokenKind::Identifier, message);
        self.declare_variable();
        let func_index = self.functions.len() - 1;
        if self.functions[func_index].scope_depth > 0 {
            return 0;
        }
        let name = self.previous.lexeme.clone();
        self.identifier_constant(&name)
    }

    fn mark_initialized(&mut self) {
        let func_index = self.functions.len() - 1;
        if self.functions[func_index].scope_depth == 0 {
            return;
        }
        let depth = self.functions[func_index].scope_depth;
        if let Some(local) = self.functions[func_index].locals.last_mut() {
            local.depth = depth;
        }
    }

    fn define_variable(&mut self, global: u8) {
        let func_index = self.functions.len() - 1;
        if self.functions[func_index].scope_depth > 0 {
            self.mark_initialized();
            return;
        }
        self.emit_op(OpCode::DefineGlobal);
        self.emit_u8(global);
    }

    fn resolve_local(&self, func_index: usize, name: &str) -> Result<Option<u8>, ()> {
        for (i, local) in self.functions[func_index].locals.iter().enumerate().rev() {
            if local.name == name {
                if local.depth == -1 {
                    return Err(());
                }
                return Ok(Some(i as u8));
            }
        }
        Ok(None)
    }

    fn resolve_upvalue(&mut self, func_index: usize, name: &str) -> Option<u8> {
        if func_index == 0 {
            return None;
        }
        let enclosing_index = func_index - 1;
        match self.resolve_local(enclosing_index, name) {
            Ok(Some(local_slot)) => {
                self.functions[enclosing_index].locals[local_slot as usize].is_captured = true;
                Some(self.add_upvalue(func_index, local_slot, true))
            }
            Ok(None) => {
                let up = self.resolve_upvalue(enclosing_index, name);
                up.map(|up_slot| self.add_upvalue(func_index, up_slot, false))
            }
            Err(()) => {
                self.error("Can't read local variable in its own initializer.");
                None
            }
        }
    }

    fn add_upvalue(&mut self, func_index: usize, index: u8, is_local: bool) -> u8 {
        if let Some(pos) =
            self.functions[func_index].upvalues.iter().position(|u| u.index == index && u.is_local == is_local)
        {
            return pos as u8;
        }
        if self.functions[func_index].upvalues.len() >= MAX_UPVALUES {
            self.error("Too many closure variables in function.");
            return 0;
        }
        self.functions[func_index].upvalues.push(UpvalueInfo { index, is_local });
        (self.functions[func_index].upvalues.len() - 1) as u8
    }

    fn named_variable(&mut self, name: &str, can_assign: bool) {
        let func_index = self.functions.len() - 1;
        let local_slot = match self.resolve_local(func_index, name) {
            Ok(v) => v,
            Err(()) => {
                self.error("Can't read local variable in its own initializer.");
                None
            }
        };
        let (get_op, set_op, arg) = if let Some(slot) = local_slot {
            (OpCode::GetLocal, OpCode::SetLocal, slot)
        } else if let Some(up_slot) = self.resolve_upvalue(func_index, name) {
            (OpCode::GetUpvalue, OpCode::SetUpvalue, up_slot)
        } else {
            let idx = self.identifier_constant(name);
            (OpCode::GetGlobal, OpCode::SetGlobal, idx)
        };
        if can_assign && self.match_token(TokenKind::Equal) {
            self.expression();
            self.emit_op(set_op);
            self.emit_u8(arg);
        } else {
            self.emit_op(get_op);
            self.emit_u8(arg);
        }
    }

    // ---- declarations ----------------------------------------------------

    fn declaration(&mut self) {
        if self.match_token(TokenKind::Class) {
            self.class_declaration();
        } else if self.match_token(TokenKind::Fun) {
            self.fun_declaration();
        } else if self.match_token(TokenKind::Var) {
            self.var_declaration();
        } else {
            self.statement();
        }
        if self.panic_mode {
            self.synchronize();
        }
    }

    fn class_declaration(&mut self) {
        self.consume(TokenKind::Identifier, "Expect class name.");
        let class_name = self.previous.lexeme.clone();
        let name_constant = self.identifier_constant(&class_name);
        self.declare_variable();

        self.emit_op(OpCode::Class);
        self.emit_u8(name_constant);
        self.define_variable(name_constant);

        self.classes.push(ClassState { has_superclass: false });

        if self.match_token(TokenKind::Less) {
            self.consume(TokenKind::Identifier, "Expect superclass name.");
            let super_name = self.previous.lexeme.clone();
            if super_name == class_name {
                self.error("A class can't inherit from itself.");
            }
            self.named_variable(&super_name, false);

            self.begin_scope();
            self.add_local("super".to_string());
            self.define_variable(0);

            self.named_variable(&class_name, false);
            self.emit_op(OpCode::Inherit);
            self.classes.last_mut().expect("just pushed").has_superclass = true;
        }

        self.named_variable(&class_name, false);
        self.consume(TokenKind::LeftBrace, "Expect '{' before class body.");
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            self.method();
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after class body.");
        self.emit_op(OpCode::Pop);

        if self.classes.last().expect("just pushed").has_superclass {
            self.end_scope();
        }
        self.classes.pop();
    }

    fn method(&mut self) {
        self.consume(TokenKind::Identifier, "Expect method name.");
        let name = self.previous.lexeme.clone();
        let constant = self.identifier_constant(&name);
        let kind = if name == "init" { FunctionKind::Initializer } else { FunctionKind::Method };
        self.function(kind);
        self.emit_op(OpCode::Method);
        self.emit_u8(constant);
    }

    fn fun_declaration(&mut self) {
        let global = self.parse_variable("Expect function name.");
        self.mark_initialized();
        self.function(FunctionKind::Function);
        self.define_variable(global);
    }

    fn function(&mut self, kind: FunctionKind) {
        let name_str = self.previous.lexeme.clone();
        let roots = self.roots();
        let name_ref: ObjRef<LoxString> = self.heap.intern(&name_str, &CompilerRoots { refs: &roots });
        let roots = self.roots();
        let func_ref = self.heap.alloc_function(LoxFunction::new(Some(name_ref)), &CompilerRoots { refs: &roots });

        let initial_local = if matches!(kind, FunctionKind::Method | FunctionKind::Initializer) {
            Local { name: "this".to_string(), depth: 0, is_captured: false }
        } else {
            Local { name: String::new(), depth: 0, is_captured: false }
        };
        self.functions.push(FunctionState {
            function_ref: func_ref,
            kind,
            locals: vec![initial_local],
            upvalues: Vec::new(),
            scope_depth: 0,
        });
        self.begin_scope();

        self.consume(TokenKind::LeftParen, "Expect '(' after function name.");
        let mut arity: u32 = 0;
        if !self.check(TokenKind::RightParen) {
            loop {
                arity += 1;
                if arity > 255 {
                    self.error_at_current("Can't have more than 255 parameters.");
                }
                let constant = self.parse_variable("Expect parameter name.");
                self.define_variable(constant);
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expect ')' after parameters.");
        self.heap.get_function_mut(func_ref).arity = arity.min(255) as u8;
        self.consume(TokenKind::LeftBrace, "Expect '{' before function body.");
        self.block();

        self.emit_return();
        let state = self.functions.pop().expect("just pushed");
        self.heap.get_function_mut(func_ref).upvalue_count = state.upvalues.len() as u8;

        let const_idx = self.make_constant(Value::Obj(Obj::Function(func_ref)));
        self.emit_op(OpCode::Closure);
        if const_idx > u8::MAX as usize {
            self.error("Too many constants in one chunk.");
        }
        self.emit_u8(const_idx as u8);
        for up in &state.upvalues {
            self.emit_u8(if up.is_local { 1 } else { 0 });
            self.emit_u8(up.index);
        }
    }

    fn var_declaration(&mut self) {
        let global = self.parse_variable("Expect variable name.");
        if self.match_token(TokenKind::Equal) {
            self.expression();
        } else {
            self.emit_op(OpCode::Nil);
        }
        self.consume(TokenKind::Semicolon, "Expect ';' after variable declaration.");
        self.define_variable(global);
    }

    // ---- statements --------------------------------------------------

    fn statement(&mut self) {
        if self.match_token(TokenKind::Print) {
            self.print_statement();
        } else if self.match_token(TokenKind::If) {
            self.if_statement();
        } else if self.match_token(TokenKind::Return) {
            self.return_statement();
        } else if self.match_token(TokenKind::While) {
            self.while_statement();
        } else if self.match_token(TokenKind::For) {
            self.for_statement();
        } else if self.match_token(TokenKind::LeftBrace) {
            self.begin_scope();
            self.block();
            self.end_scope();
        } else {
            self.expression_statement();
        }
    }

    fn print_statement(&mut self) {
        self.expression();
        self.consume(TokenKind::Semicolon, "Expect ';' after value.");
        self.emit_op(OpCode::Print);
    }

    fn expression_statement(&mut self) {
        self.expression();
        self.consume(TokenKind::Semicolon, "Expect ';' after expression.");
        self.emit_op(OpCode::Pop);
    }

    fn block(&mut self) {
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            self.declaration();
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after block.");
    }

    fn if_statement(&mut self) {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'if'.");
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after condition.");

        let then_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit_op(OpCode::Pop);
        self.statement();

        let else_jump = self.emit_jump(OpCode::Jump);
        self.patch_jump(then_jump);
        self.emit_op(OpCode::Pop);

        if self.match_token(TokenKind::Else) {
            self.statement();
        }
        self.patch_jump(else_jump);
    }

    fn while_statement(&mut self) {
        let loop_start = self.current_chunk_len();
        self.consume(TokenKind::LeftParen, "Expect '(' after 'while'.");
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after condition.");

        let exit_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit_op(OpCode::Pop);
        self.statement();
        self.emit_loop(loop_start);

        self.patch_jump(exit_jump);
        self.emit_op(OpCode::Pop);
    }

    fn for_statement(&mut self) {
        self.begin_scope();
        self.consume(TokenKind::LeftParen, "Expect '(' after 'for'.");
        if self.match_token(TokenKind::Semicolon) {
            // no initializer
        } else if self.match_token(TokenKind::Var) {
            self.var_declaration();
        } else {
            self.expression_statement();
        }

        let mut loop_start = self.current_chunk_len();
        let mut exit_jump: Option<usize> = None;
        if !self.match_token(TokenKind::Semicolon) {
            self.expression();
            self.consume(TokenKind::Semicolon, "Expect ';' after loop condition.");
            exit_jump = Some(self.emit_jump(OpCode::JumpIfFalse));
            self.emit_op(OpCode::Pop);
        }

        if !self.match_token(TokenKind::RightParen) {
            let body_jump = self.emit_jump(OpCode::Jump);
            let increment_start = self.current_chunk_len();
            self.expression();
            self.emit_op(OpCode::Pop);
            self.consume(TokenKind::RightParen, "Expect ')' after for clauses.");

            self.emit_loop(loop_start);
            loop_start = increment_start;
            self.patch_jump(body_jump);
        }

        self.statement();
        self.emit_loop(loop_start);

        if let Some(exit) = exit_jump {
            self.patch_jump(exit);
            self.emit_op(OpCode::Pop);
        }
        self.end_scope();
    }

    fn return_statement(&mut self) {
        if self.functions.last().expect("function state").kind == FunctionKind::Script {
            self.error("Can't return from top-level code.");
        }
        if self.match_token(TokenKind::Semicolon) {
            self.emit_return();
        } else {
            if self.functions.last().expect("function state").kind == FunctionKind::Initializer {
                self.error("Can't return a value from an initializer.");
            }
            self.expression();
            self.consume(TokenKind::Semicolon, "Expect ';' after return value.");
            self.emit_op(OpCode::Return);
        }
    }

    // ---- expressions -------------------------------------------------

    fn expression(&mut self) {
        self.parse_precedence(Precedence::Assignment);
    }

    fn parse_precedence(&mut self, precedence: Precedence) {
        self.advance();
        let can_assign = precedence <= Precedence::Assignment;
        if !self.prefix_rule(can_assign) {
            self.error("Expect expression.");
            return;
        }
        while precedence <= Self::precedence_of(self.current.kind) {
            self.advance();
            self.infix_rule(can_assign);
        }
        if can_assign && self.match_token(TokenKind::Equal) {
            self.error("Invalid assignment target.");
        }
    }

    fn precedence_of(kind: TokenKind) -> Precedence {
        use TokenKind::*;
        match kind {
            Or => Precedence::Or,
            And => Precedence::And,
            EqualEqual | BangEqual => Precedence::Equality,
            Less | LessEqual | Greater | GreaterEqual => Precedence::Comparison,
            Plus | Minus => Precedence::Term,
            Star | Slash => Precedence::Factor,
            LeftParen | Dot => Precedence::Call,
            _ => Precedence::None,
        }
    }

    fn prefix_rule(&mut self, can_assign: bool) -> bool {
        match self.previous.kind {
            TokenKind::LeftParen => self.grouping(can_assign),
            TokenKind::Minus | TokenKind::Bang => self.unary(can_assign),
            TokenKind::Number => self.number(can_assign),
            TokenKind::String => self.string(can_assign),
            TokenKind::False | TokenKind::Nil | TokenKind::True => self.literal(can_assign),
            TokenKind::Identifier => self.variable(can_assign),
            TokenKind::This => self.this_(can_assign),
            TokenKind::Super => self.super_(can_assign),
            _ => return false,
        }
        true
    }

    fn infix_rule(&mut self, can_assign: bool) {
        match self.previous.kind {
            TokenKind::Minus
            | TokenKind::Plus
            | TokenKind::Slash
            | TokenKind::Star
            | TokenKind::EqualEqual
            | TokenKind::BangEqual
            | TokenKind::Less
            | TokenKind::LessEqual
            | TokenKind::Greater
            | TokenKind::GreaterEqual => self.binary(can_assign),
            TokenKind::And => self.and_(can_assign),
            TokenKind::Or => self.or_(can_assign),
            TokenKind::LeftParen => self.call(can_assign),
            TokenKind::Dot => self.dot(can_assign),
            _ => {}
        }
    }

    fn grouping(&mut self, _can_assign: bool) {
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after expression.");
    }

    fn number(&mut self, _can_assign: bool) {
        let value: f64 = self.previous.lexeme.parse().unwrap_or(0.0);
        self.emit_constant(Value::Number(value));
    }

    fn string(&mut self, _can_assign: bool) {
        let lexeme = self.previous.lexeme.clone();
        let content = &lexeme[1..lexeme.len() - 1];
        let roots = self.roots();
        let str_ref: ObjRef<LoxString> = self.heap.intern(content, &CompilerRoots { refs: &roots });
        self.emit_constant(Value::Obj(Obj::Str(str_ref)));
    }

    fn literal(&mut self, _can_assign: bool) {
        match self.previous.kind {
            TokenKind::False => self.emit_op(OpCode::False),
            TokenKind::Nil => self.emit_op(OpCode::Nil),
            TokenKind::True => self.emit_op(OpCode::True),
            _ => unreachable!("literal() dispatched on a non-literal token"),
        }
    }

    fn variable(&mut self, can_assign: bool) {
        let name = self.previous.lexeme.clone();
        self.named_variable(&name, can_assign);
    }

    fn this_(&mut self, _can_assign: bool) {
        if self.classes.is_empty() {
            self.error("Can't use 'this' outside of a class.");
            return;
        }
        self.named_variable("this", false);
    }

    fn super_(&mut self, _can_assign: bool) {
        if self.classes.is_empty() {
            self.error("Can't use 'super' outside of a class.");
        } else if !self.classes.last().expect("checked above").has_superclass {
            self.error("Can't use 'super' in a class with no superclass.");
        }
        self.consume(TokenKind::Dot, "Expect '.' after 'super'.");
        self.consume(TokenKind::Identifier, "Expect superclass method name.");
        let method_name = self.previous.lexeme.clone();
        let name_constant = self.identifier_constant(&method_name);

        self.named_variable("this", false);
        if self.match_token(TokenKind::LeftParen) {
            let arg_count = self.argument_list();
            self.named_variable("super", false);
            self.emit_op(OpCode::SuperInvoke);
            self.emit_u8(name_constant);
            self.emit_u8(arg_count);
        } else {
            self.named_variable("super", false);
            self.emit_op(OpCode::GetSuper);
            self.emit_u8(name_constant);
        }
    }

    fn unary(&mut self, _can_assign: bool) {
        let operator = self.previous.kind;
        self.parse_precedence(Precedence::Unary);
        match operator {
            TokenKind::Minus => self.emit_op(OpCode::Negate),
            TokenKind::Bang => self.emit_op(OpCode::Not),
            _ => unreachable!("unary() dispatched on a non-unary token"),
        }
    }

    fn binary(&mut self, _can_assign: bool) {
        let operator = self.previous.kind;
        let rule_prec = Self::precedence_of(operator);
        self.parse_precedence(rule_prec.next());
        match operator {
            TokenKind::BangEqual => {
                self.emit_op(OpCode::Equal);
                self.emit_op(OpCode::Not);
            }
            TokenKind::EqualEqual => self.emit_op(OpCode::Equal),
            TokenKind::Greater => self.emit_op(OpCode::Greater),
            TokenKind::GreaterEqual => {
                self.emit_op(OpCode::Less);
                self.emit_op(OpCode::Not);
            }
            TokenKind::Less => self.emit_op(OpCode::Less),
            TokenKind::LessEqual => {
                self.emit_op(OpCode::Greater);
                self.emit_op(OpCode::Not);
            }
            TokenKind::Plus => self.emit_op(OpCode::Add),
            TokenKind::Minus => self.emit_op(OpCode::Subtract),
            TokenKind::Star => self.emit_op(OpCode::Multiply),
            TokenKind::Slash => self.emit_op(OpCode::Divide),
            _ => unreachable!("binary() dispatched on a non-binary token"),
        }
    }

    fn and_(&mut self, _can_assign: bool) {
        let end_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit_op(OpCode::Pop);
        self.parse_precedence(Precedence::And);
        self.patch_jump(end_jump);
    }

    fn or_(&mut self, _can_assign: bool) {
        let else_jump = self.emit_jump(OpCode::JumpIfFalse);
        let end_jump = self.emit_jump(OpCode::Jump);
        self.patch_jump(else_jump);
        self.emit_op(OpCode::Pop);
        self.parse_precedence(Precedence::Or);
        self.patch_jump(end_jump);
    }

    fn call(&mut self, _can_assign: bool) {
        let arg_count = self.argument_list();
        self.emit_op(OpCode::Call);
        self.emit_u8(arg_count);
    }

    fn argument_list(&mut self) -> u8 {
        let mut count: u32 = 0;
        if !self.check(TokenKind::RightParen) {
            loop {
                self.expression();
                if count == 255 {
                    self.error("Can't have more than 255 arguments.");
                }
                count += 1;
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expect ')' after arguments.");
        count.min(255) as u8
    }

    fn dot(&mut self, can_assign: bool) {
        self.consume(TokenKind::Identifier, "Expect property name after '.'.");
        let name = self.previous.lexeme.clone();
        let name_constant = self.identifier_constant(&name);

        if can_assign && self.match_token(TokenKind::Equal) {
            self.expression();
            self.emit_op(OpCode::SetProperty);
            self.emit_u8(name_constant);
        } else if self.match_token(TokenKind::LeftParen) {
            let arg_count = self.argument_list();
            self.emit_op(OpCode::Invoke);
            self.emit_u8(name_constant);
            self.emit_u8(arg_count);
        } else {
            self.emit_op(OpCode::GetProperty);
            self.emit_u8(name_constant);
        }
    }
}
