pub mod todo;

pub use todo::{
    CreateTodoRequest, CreateTodoResponse, DeleteTodoRequest, DeleteTodoResponse,
    ReadTodoRequest, ReadTodoResponse, Todo, UpdateTodoRequest, UpdateTodoResponse,
};
